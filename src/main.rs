//! Lesson Recommender - adaptive lesson recommendations from the command line

use clap::Parser;
use lesson_recommender::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // WARN by default (DEBUG with -v), RUST_LOG still applies on top
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(cli.log_level().into())
        )
        .init();

    cli::run(cli).await
}
