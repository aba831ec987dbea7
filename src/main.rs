//! rr-balance: round-robin HTTP reverse proxy
//!
//! Distributes every inbound request across the replicas listed in the
//! configuration file, in fixed rotation.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

use rr_balance::{config::AppConfig, run_server, BackendRegistry};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";

#[derive(Parser)]
#[command(name = "rr-balance")]
#[command(version = "0.1.0")]
#[command(about = "Round-robin HTTP reverse proxy load balancer")]
#[command(long_about = "
rr-balance forwards every HTTP request it receives to the next backend
replica in a fixed rotation across all configured services.

Example usage:
  rr-balance --config config.yaml run --port 8080
  rr-balance --config config.yaml check-config
")]
struct Cli {
    /// Path to config file [default: first of config.yaml, config.yml, config/config.yaml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Defaults to `run` with default options
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the load balancer
    Run {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Address to listen on
        #[arg(long, default_value = DEFAULT_HOST)]
        host: IpAddr,
    },

    /// Validate configuration file and list the resolved backends
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    match cli.command {
        Some(Commands::Run { port, host }) => {
            run_proxy(cli.config, SocketAddr::new(host, port)).await;
        }
        Some(Commands::CheckConfig) => {
            check_config(cli.config);
        }
        None => {
            let host: IpAddr = DEFAULT_HOST.parse()?;
            run_proxy(cli.config, SocketAddr::new(host, DEFAULT_PORT)).await;
        }
    }

    Ok(())
}

/// Run the load balancer; startup failures exit with status 1
async fn run_proxy(config_path: Option<PathBuf>, addr: SocketAddr) {
    let config = load_config_or_exit(config_path.as_deref());

    tracing::info!(
        strategy = %config.strategy,
        services = config.services.len(),
        replicas = config.replica_count(),
        "Loaded configuration"
    );

    if let Err(e) = run_server(&config, addr).await {
        tracing::error!(error = %e, "rr-balance failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Validate configuration file
fn check_config(config_path: Option<PathBuf>) {
    let config = load_config_or_exit(config_path.as_deref());

    match BackendRegistry::from_config(&config) {
        Ok(registry) => {
            println!("✓ Configuration file is valid\n");
            println!("Strategy: {}", registry.strategy());
            println!("\nServices:");
            for service in &config.services {
                println!("  {} ({} replicas)", service.name, service.replicas.len());
            }
            println!("\nBackends (rotation order):");
            for (index, backend) in registry.backends().iter().enumerate() {
                println!("  [{}] {}", index, backend.base_url());
            }
            println!("\nForwarding:");
            println!("  Connect timeout: {}s", config.forwarding.connect_timeout_seconds);
            match config.forwarding.timeout_seconds {
                Some(secs) => println!("  Request timeout: {}s", secs),
                None => println!("  Request timeout: none"),
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: Option<&Path>) -> AppConfig {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nMake sure you have a config.yaml file.");
            eprintln!("You can copy config.yaml.example and modify it:");
            eprintln!("  cp config.yaml.example config.yaml");
            std::process::exit(1);
        }
    }
}
