#![cfg(not(tarpaulin_include))]

use kpi_sheet::app;
use kpi_sheet::config::Config;
use std::env;

/// Main entry point for the KPI web application
///
/// Starts the web server on the address given as the first argument, or on
/// `127.0.0.1:3000` when none is given. Log output is controlled through
/// `RUST_LOG` and defaults to `info`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_args(&args);

    app::run(config).await
}
