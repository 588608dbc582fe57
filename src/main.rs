//! bayes-svr - Main Entry Point
//!
//! Command-line front end for Bayesian-tuned support vector regression.

use bayes_svr::cli::{run, Cli};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bayes_svr=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}
