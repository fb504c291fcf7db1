mod cli;
mod config;
mod discovery;
mod error;
mod lease;
mod location;
mod machine;
mod model;
mod presenter;
mod query;
mod scheduler;
mod service;
mod storage;

use std::process;

use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr; stdout carries place cards and command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("SPOTNEAR_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = cli::run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
