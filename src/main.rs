//! WolfVote - Single-Session Voting Workflow Service
//!
//! Runs one election behind an HTTP API.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfvote::api::{HttpServer, StatusResponse};
use wolfvote::config::{LoggingConfig, WolfVoteConfig};
use wolfvote::election::ElectionService;
use wolfvote::error::Result;

/// WolfVote - Single-Session Voting Workflow Service
#[derive(Parser)]
#[command(name = "wolfvote")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfvote.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the election service
    Serve {
        /// Override the API bind address (host:port)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfvote.toml")]
        output: PathBuf,

        /// Administrator identity
        #[arg(long)]
        admin: String,

        /// Election name
        #[arg(long, default_value = "election")]
        name: String,
    },

    /// Validate configuration file
    Validate,

    /// Query a running node's status
    Status {
        /// Node address to query
        #[arg(short, long, default_value = "localhost:8080")]
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => run_serve(cli.config, cli.log_level, bind).await,
        Commands::Init { output, admin, name } => {
            init_logging(&LoggingConfig::default(), cli.log_level.as_deref())?;
            run_init(output, admin, name)
        }
        Commands::Validate => {
            init_logging(&LoggingConfig::default(), cli.log_level.as_deref())?;
            run_validate(cli.config)
        }
        Commands::Status { address } => {
            init_logging(&LoggingConfig::default(), cli.log_level.as_deref())?;
            run_status(address).await
        }
    }
}

/// Initialize logging
fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let level = level_override.unwrap_or(&config.level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let writer = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(config.file.is_none());

    if config.format == "compact" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.compact())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .init();
    }

    Ok(())
}

/// Start the election service
async fn run_serve(
    config_path: PathBuf,
    level: Option<String>,
    bind: Option<String>,
) -> Result<()> {
    let mut config = match WolfVoteConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration from {:?}: {}", config_path, e);
            eprintln!("Please check that the config file exists and is valid TOML");
            return Err(e);
        }
    };
    if let Some(bind) = bind {
        config.api.bind_address = bind;
    }

    init_logging(&config.logging, level.as_deref())?;
    tracing::info!("Starting WolfVote for election '{}'", config.election.name);
    tracing::info!("Administrator: {}", config.election.admin);

    let election = Arc::new(ElectionService::new(&config.election)?);
    let server = HttpServer::new(config.api.clone(), election);

    if let Err(e) = server.start_with_shutdown(shutdown_signal()).await {
        tracing::error!("HTTP server error: {}", e);
        return Err(e);
    }

    tracing::info!("WolfVote shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Received shutdown signal");
}

/// Initialize configuration file
fn run_init(output: PathBuf, admin: String, name: String) -> Result<()> {
    if admin.trim().is_empty() {
        return Err(wolfvote::Error::Config("--admin cannot be empty".into()));
    }

    std::fs::write(&output, WolfVoteConfig::template(&admin, &name))?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to adjust the election and API settings.");
    println!("Then start with: wolfvote --config {} serve", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    match WolfVoteConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Election:      {}", config.election.name);
            println!("  Administrator: {}", config.election.admin);
            print_api(&config, &config_path);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration is invalid: {}", e);
            Err(e)
        }
    }
}

fn print_api(config: &WolfVoteConfig, path: &Path) {
    if config.api.enabled {
        println!("  HTTP API:      {}", config.api.bind_address);
    } else {
        println!("  HTTP API:      disabled (set api.enabled in {})", path.display());
    }
}

/// Query a running node's status
async fn run_status(address: String) -> Result<()> {
    let url = format!("http://{}/status", address);

    let response = reqwest::get(&url)
        .await
        .map_err(|e| wolfvote::Error::Network(format!("Failed to reach {}: {}", url, e)))?;
    if !response.status().is_success() {
        return Err(wolfvote::Error::Network(format!("API error: {}", response.status())));
    }

    let status: StatusResponse = response
        .json()
        .await
        .map_err(|e| wolfvote::Error::Network(format!("Invalid status response: {}", e)))?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}
