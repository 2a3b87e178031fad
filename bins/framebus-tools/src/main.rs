mod cmd;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "framebus-tools", about = "Test stages for framebus pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish a synthetic video stream.
    Pub(cmd::publish::PublishArgs),
    /// Subscribe to a stream and report its frame rate.
    Probe(cmd::probe::ProbeArgs),
    /// Forward a stream unchanged between two channels.
    Relay(cmd::relay::RelayArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Pub(args) => cmd::publish::run(args).await,
        Command::Probe(args) => cmd::probe::run(args).await,
        Command::Relay(args) => cmd::relay::run(args).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "stage failed");
        std::process::exit(1);
    }
}
