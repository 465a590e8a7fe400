//! Eventcast Server
//!
//! Run with: cargo run -- serve
//!
//! # Configuration
//!
//! Settings come from a TOML file (`--config`, or the first of
//! `~/.config/eventcast/config.toml`, `/etc/eventcast/config.toml`,
//! `./config.toml`), then `EVENTCAST_*` environment variables, then flags.
//! `RUST_LOG` takes precedence over the configured log level.

use clap::{Parser, Subcommand};
use eventcast::api::{serve, AppState};
use eventcast::config::{generate_default_config, Config, LoggingConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "eventcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Broadcast application state changes to WebSocket subscribers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP and WebSocket server
    Serve {
        /// Config file (default: search standard locations)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let (mut config, source) = match config {
                Some(path) => (Config::load_with_env(&path)?, Some(path)),
                None => Config::load_default()?,
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            init_logging(&config.logging);
            match source {
                Some(path) => tracing::info!("Loaded config from {:?}", path),
                None => tracing::info!("Using default config with environment overrides"),
            }

            run_server(config).await?;
        }
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    println!("Wrote default config to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting Eventcast v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        queue_capacity = config.events.queue_capacity,
        snapshot = ?config.events.snapshot,
        "Broadcaster configured"
    );

    let state = AppState::from_config(&config);
    let broadcaster = state.broadcaster.clone();

    serve(state).await?;

    // The server dropped the last publisher; wait for subscribers to be closed
    if tokio::time::timeout(Duration::from_secs(5), broadcaster.closed())
        .await
        .is_err()
    {
        tracing::warn!("Broadcaster did not stop within 5s");
    }

    tracing::info!("Eventcast stopped");
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("eventcast={},tower_http=info", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
