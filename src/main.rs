use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fanrelay::config::Config;

mod commands;

use commands::{call, locations, serve};

#[derive(Parser)]
#[command(
    name = "fanrelay",
    version,
    about = "Failover-aware fan-out relay over backend replicas",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay HTTP server
    Serve {
        /// Bind address, e.g. 0.0.0.0:8080
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Send one request to a service with failover and print the body
    Call {
        /// Logical service name
        service: String,

        /// Request path below the service, e.g. /echo/hi
        path: String,
    },

    /// Print the configured locations of a service in failover order
    Locations {
        /// Logical service name
        service: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());

    // Initialize tracing/logging
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.runtime.worker_threads)
        .thread_name("fanrelay-worker")
        .enable_all()
        .build()
        .context("Failed to build the worker runtime")?;

    runtime.block_on(run(cli.command, config))
}

async fn run(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Serve { bind } => {
            tracing::info!(bind = ?bind, "Starting serve command");
            serve(config, bind).await?;
        }

        Commands::Call { service, path } => {
            tracing::info!(service = %service, path = %path, "Starting call command");
            call(config, service, path).await?;
        }

        Commands::Locations { service } => {
            locations(config, service)?;
        }
    }

    Ok(())
}

// validated here so a bad value never reaches the runtime builder
fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    Config::load(path).context("Failed to load configuration")
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("fanrelay=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("fanrelay={level},warn"))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
