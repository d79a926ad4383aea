use core::error::Error;
use std::io::stdout;

use clap::Parser;
use crossterm::tty::IsTty;
use stampede::{cfg::Config, cmd::Cmd, engine::Engine, report};

pub fn main() {
    let cmd = Cmd::parse();
    stampede::logging::init(cmd.verbose as usize).unwrap();

    if let Err(err) = run(cmd) {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}

fn run(cmd: Cmd) -> Result<(), Box<dyn Error>> {
    let color = !cmd.no_color && stdout().is_tty();
    let output = cmd.output.clone();
    let json = cmd.json.clone();

    let cfg: Config = cmd.try_into()?;

    log::info!("running against {} with {} workers", cfg.url, cfg.concurrency);

    let engine = Engine::new(cfg);
    let results = engine.run()?;

    report::print(&results, color);

    if let Some(path) = &output {
        report::save_to_file(&results, path)?;
        log::info!("report written to {}", path.display());
    }
    if let Some(path) = &json {
        report::write_json(&results, path)?;
        log::info!("JSON report written to {}", path.display());
    }

    Ok(())
}
