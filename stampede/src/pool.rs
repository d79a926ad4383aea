use core::{num::NonZero, time::Duration};
use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex},
    thread::{Builder, JoinHandle},
    time::Instant,
};

use anyhow::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads consuming a FIFO task queue.
///
/// Tasks are executed at most once each. A panicking task is contained at the
/// pool boundary: the worker logs it and moves on to the next task.
#[derive(Debug)]
pub struct WorkerPool {
    inner: Arc<Inner>,
    workers: Vec<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<QueueState>,
    /// Signalled when a task is enqueued or shutdown is requested.
    available: Condvar,
    /// Signalled when the queue runs dry with no task in flight.
    done: Condvar,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<Job>,
    /// Number of tasks currently executing.
    active: usize,
    stopped: bool,
}

impl core::fmt::Debug for QueueState {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fmt.debug_struct("QueueState")
            .field("queue", &self.queue.len())
            .field("active", &self.active)
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl WorkerPool {
    /// Spawns exactly `num_workers` worker threads.
    pub fn new(num_workers: NonZero<usize>) -> Result<Self, Error> {
        let inner = Arc::new(Inner::default());

        let mut workers = Vec::with_capacity(num_workers.get());
        for idx in 0..num_workers.get() {
            let worker = {
                let inner = inner.clone();

                Builder::new()
                    .name(format!("stampede:w{idx}"))
                    .spawn(move || inner.worker_loop())?
            };

            workers.push(worker);
        }

        Ok(Self { inner, workers })
    }

    /// Enqueues a task.
    ///
    /// The queue is unbounded, so this never blocks on worker availability.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock().unwrap();
        state.queue.push_back(Box::new(task));
        drop(state);

        self.inner.available.notify_one();
    }

    /// Blocks until the queue is empty and no task is executing.
    ///
    /// Both conditions are observed under the queue lock, so a worker racing
    /// to drain the last task cannot slip between the checks.
    pub fn wait_for_completion(&self) {
        let mut state = self.inner.state.lock().unwrap();
        while !(state.queue.is_empty() && state.active == 0) {
            state = self.inner.done.wait(state).unwrap();
        }
    }

    /// Bounded [`Self::wait_for_completion`].
    ///
    /// Returns `true` if all work finished within the given timeout.
    pub fn wait_for_completion_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        let mut state = self.inner.state.lock().unwrap();
        loop {
            if state.queue.is_empty() && state.active == 0 {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            (state, _) = self.inner.done.wait_timeout(state, deadline - now).unwrap();
        }
    }

    /// Signals all workers to stop and joins them.
    ///
    /// Workers finish whatever is queued first: the stop flag only takes
    /// effect once the queue runs dry. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.stopped = true;
        }
        self.inner.available.notify_all();

        for worker in self.workers.drain(..) {
            worker.join().expect("no self join");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // No worker thread may outlive the pool.
        self.shutdown();
    }
}

impl Inner {
    fn worker_loop(&self) {
        loop {
            let job = {
                let mut state = self.state.lock().unwrap();
                loop {
                    if let Some(job) = state.queue.pop_front() {
                        state.active += 1;
                        break job;
                    }
                    if state.stopped {
                        return;
                    }

                    state = self.available.wait(state).unwrap();
                }
            };

            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
                log::error!("task panicked: {}", panic_message(&panic));
            }

            let mut state = self.state.lock().unwrap();
            state.active -= 1;
            if state.queue.is_empty() && state.active == 0 {
                self.done.notify_all();
            }
        }
    }
}

fn panic_message(panic: &(dyn core::any::Any + Send)) -> &str {
    if let Some(&message) = panic.downcast_ref::<&str>() {
        return message;
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message;
    }

    "unknown panic"
}
