//! aetest - command-line entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use aetest::cli::{Cli, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aetest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(cli).await
}
