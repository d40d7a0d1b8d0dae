use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logrelay")]
#[command(about = "Relay exported GCP logs from Pub/Sub into CloudWatch Logs", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain the subscription once, or repeatedly with --interval
    Run {
        /// Pause between cycles, e.g. `2m`
        #[arg(long, value_parser = logrelay::cli::run::parse_interval)]
        interval: Option<std::time::Duration>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logrelay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = logrelay::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run { interval }) => {
            logrelay::cli::run::run(config_path, interval).await?;
        }
        None => {
            logrelay::cli::run::run(config_path, None).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                logrelay::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
