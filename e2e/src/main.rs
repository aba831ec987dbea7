//! rr-balance e2e test runner
//!
//! Default (no args): spawns the mock replicas and the proxy, runs all tests, kills it.
//!
//!   cargo run                          # auto-detect proxy binary, run all tests
//!   cargo run -- list                  # list all tests
//!   cargo run -- run                   # connect to already-running proxy
//!   cargo run -- spawn-and-run [opts]  # explicit paths / ports

mod backend;
mod client;
mod runner;
mod tests;
mod types;

use clap::{Parser, Subcommand};
use colored::Colorize;
use runner::{list_tests, run_tests, TestContext};
use tests::all_tests;

/// Default proxy binary candidates, tried in order
const DEFAULT_PROXY_BINS: &[&str] = &["../target/release/rr-balance", "../target/debug/rr-balance"];

const DEFAULT_PROXY_CONFIG: &str = "test_configs/proxy.yaml";
const DEFAULT_BACKEND_PORTS: &[u16] = &[18081, 18082];
const DEFAULT_PROXY_PORT: u16 = 18066;

#[derive(Parser)]
#[command(
    name = "e2e",
    about = "End-to-end tests for rr-balance",
    long_about = "Runs all e2e tests by default (no arguments needed).\n\
                  Spawns the proxy binary automatically, runs tests, then kills it."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Only run tests whose name contains this string (applies to default run)
    #[arg(long, short, global = true)]
    filter: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to an already-running proxy and run tests
    Run {
        /// Address of the real proxy
        #[arg(long, default_value = "127.0.0.1:18066")]
        proxy_addr: String,

        /// Ports for the mock replicas - must match the proxy's config, in order
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_BACKEND_PORTS.to_vec())]
        backend_ports: Vec<u16>,
    },

    /// List all available tests
    List,

    /// Spawn the proxy binary, run all tests, then kill it
    SpawnAndRun {
        /// Path to the rr-balance binary
        #[arg(long)]
        proxy_bin: Option<String>,

        /// Path to the proxy config YAML (replicas must point at the mock ports)
        #[arg(long, default_value = DEFAULT_PROXY_CONFIG)]
        proxy_config: String,

        /// Ports for the mock replicas - must match config, in order
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_BACKEND_PORTS.to_vec())]
        backend_ports: Vec<u16>,

        /// Proxy listen port
        #[arg(long, default_value_t = DEFAULT_PROXY_PORT)]
        proxy_port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // ── No subcommand: default full run ──────────────────────────────────
        None => {
            let proxy_bin = find_proxy_bin()?;
            do_spawn_and_run(
                proxy_bin,
                DEFAULT_PROXY_CONFIG.to_string(),
                DEFAULT_BACKEND_PORTS.to_vec(),
                DEFAULT_PROXY_PORT,
                cli.filter,
            )
            .await?;
        }

        // ── list ─────────────────────────────────────────────────────────────
        Some(Command::List) => {
            list_tests(&all_tests());
        }

        // ── run (connect to existing proxy) ───────────────────────────────────
        Some(Command::Run {
            proxy_addr,
            backend_ports,
        }) => {
            let backend_state = start_backends(&backend_ports).await?;

            let ctx = TestContext {
                proxy_addr,
                backend_ports,
                backend_state,
                http_client: client::build_client(),
            };

            let failed = run_tests(all_tests(), ctx, cli.filter.as_deref()).await;
            exit_on_failure(failed);
        }

        // ── spawn-and-run ─────────────────────────────────────────────────────
        Some(Command::SpawnAndRun {
            proxy_bin,
            proxy_config,
            backend_ports,
            proxy_port,
        }) => {
            let proxy_bin = match proxy_bin {
                Some(p) => p,
                None => find_proxy_bin()?,
            };
            do_spawn_and_run(proxy_bin, proxy_config, backend_ports, proxy_port, cli.filter).await?;
        }
    }

    Ok(())
}

async fn start_backends(ports: &[u16]) -> anyhow::Result<types::SharedBackendState> {
    println!("Starting {} mock replica(s) on ports {:?}...", ports.len(), ports);
    let state = backend::start(ports).await?;
    println!("Mock replicas running");
    Ok(state)
}

/// Shared implementation for spawn-and-run (used by both default and explicit subcommand)
async fn do_spawn_and_run(
    proxy_bin: String,
    proxy_config: String,
    backend_ports: Vec<u16>,
    proxy_port: u16,
    filter: Option<String>,
) -> anyhow::Result<()> {
    let backend_state = start_backends(&backend_ports).await?;

    println!(
        "Spawning proxy: {} --config {} run --port {}",
        proxy_bin, proxy_config, proxy_port
    );
    let mut proxy_process = tokio::process::Command::new(&proxy_bin)
        .arg("--config")
        .arg(&proxy_config)
        .arg("run")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(proxy_port.to_string())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| anyhow::anyhow!("Failed to spawn '{}': {}", proxy_bin, e))?;

    let proxy_addr = format!("127.0.0.1:{}", proxy_port);
    println!("Waiting for proxy at {}...", proxy_addr);
    wait_for_proxy(&proxy_addr).await?;
    println!("Proxy is ready!\n");

    let ctx = TestContext {
        proxy_addr,
        backend_ports,
        backend_state,
        http_client: client::build_client(),
    };

    let failed = run_tests(all_tests(), ctx, filter.as_deref()).await;

    proxy_process.kill().await.ok();

    exit_on_failure(failed);
    Ok(())
}

/// Find the proxy binary, trying release then debug builds
fn find_proxy_bin() -> anyhow::Result<String> {
    for candidate in DEFAULT_PROXY_BINS {
        if std::path::Path::new(candidate).exists() {
            println!("Using proxy binary: {}", candidate.bright_cyan());
            return Ok(candidate.to_string());
        }
    }
    Err(anyhow::anyhow!(
        "No proxy binary found. Tried: {}\nBuild with: cd .. && cargo build --release",
        DEFAULT_PROXY_BINS.join(", ")
    ))
}

/// Exit with code 1 if any tests failed
fn exit_on_failure(failed: usize) {
    if failed > 0 {
        std::process::exit(1);
    }
}

/// Wait for the proxy to accept TCP connections (retry with backoff)
///
/// The proxy has no routes of its own, so there is nothing to poll over HTTP
/// without also hitting a replica.
async fn wait_for_proxy(addr: &str) -> anyhow::Result<()> {
    for attempt in 0..30 {
        tokio::time::sleep(tokio::time::Duration::from_millis(200 + attempt * 100)).await;
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return Ok(());
        }
    }

    Err(anyhow::anyhow!(
        "Proxy did not start within timeout. Is the binary correct? Check: {}",
        addr
    ))
}
