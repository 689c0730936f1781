use anyhow::Context;
use clap::Parser;

use clinics_gps::{cli, commands, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    match args.cmd {
        cli::Command::Serve(cmd) => server::run(cmd).await.context("serve failed"),
        cli::Command::Search(cmd) => commands::search(cmd).await.context("search failed"),
        cli::Command::Cities(cmd) => commands::cities(cmd).await.context("cities failed"),
        cli::Command::Nearest(cmd) => commands::nearest(cmd).await.context("nearest failed"),
        cli::Command::Route(cmd) => commands::route(cmd).await.context("route failed"),
        cli::Command::Directions(cmd) => {
            commands::directions(cmd).await.context("directions failed")
        }
    }
}
