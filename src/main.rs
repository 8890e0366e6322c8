//! mydb - op channel tool
//!
//! Watches the remote op channel of a document and inspects the resolved
//! driver configuration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use mydb_driver::events::{connect_nats, NatsPublisher};
use mydb_driver::{Config, DocumentId};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mydb")]
#[command(about = "Op channel tool for mydb-driver")]
struct Cli {
    /// Path to a YAML config file (defaults to ./config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every op published for one document
    Watch {
        /// Document id (the channel name)
        id: String,

        /// NATS server (overrides config.yaml and NATS_URL)
        #[arg(long)]
        nats_url: Option<String>,
    },

    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mydb_driver=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Watch { id, nats_url } => {
            let url = nats_url.or(config.nats_url).ok_or_else(|| {
                anyhow::anyhow!("No NATS server configured (set NATS_URL or nats.url)")
            })?;
            run_watch(&url, DocumentId::new(id)).await
        }
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

async fn run_watch(url: &str, id: DocumentId) -> Result<()> {
    let publisher = NatsPublisher::new(connect_nats(url).await?);
    let mut ops = publisher.subscribe_ops(id.as_str()).await?;
    tracing::info!(channel = %id, "Watching ops");

    loop {
        tokio::select! {
            op = ops.next() => match op {
                Some(op) => println!("{}", serde_json::to_string(&op)?),
                None => {
                    tracing::info!(channel = %id, "Subscription closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
