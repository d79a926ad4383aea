pub mod cfg;
pub mod cmd;
pub mod engine;
pub mod http;
pub mod logging;
pub mod pool;
pub mod quantile;
pub mod report;
pub mod stat;
