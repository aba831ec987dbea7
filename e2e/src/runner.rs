//! Test runner - executes cases in order against one proxy

use colored::Colorize;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use crate::types::SharedBackendState;

pub type TestFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A single named test case
pub struct TestCase {
    pub name: &'static str,
    pub description: &'static str,
    pub run: Box<dyn Fn(TestContext) -> TestFuture + Send + Sync>,
}

/// Everything a case needs: where the proxy is, which replicas sit behind it,
/// and the state those replicas record into
#[derive(Clone)]
pub struct TestContext {
    pub proxy_addr: String,
    pub backend_ports: Vec<u16>,
    pub backend_state: SharedBackendState,
    pub http_client: reqwest::Client,
}

const RULE: &str = "═══════════════════════════════════════════════════";

/// Run matching cases sequentially; returns the number of failures
pub async fn run_tests(cases: Vec<TestCase>, ctx: TestContext, filter: Option<&str>) -> usize {
    let selected: Vec<&TestCase> = cases
        .iter()
        .filter(|c| filter.map_or(true, |f| c.name.contains(f)))
        .collect();

    let ports: Vec<String> = ctx.backend_ports.iter().map(u16::to_string).collect();
    println!("\n{}", RULE.bright_blue());
    println!("{}", "  rr-balance End-to-End Tests".bright_white().bold());
    println!("{}", RULE.bright_blue());
    println!("  Proxy:    {}", ctx.proxy_addr.bright_cyan());
    println!("  Replicas: {}", ports.join(", ").bright_cyan());
    println!("  Running:  {} test(s)\n", selected.len().to_string().bright_cyan());

    let mut failed = 0;
    for case in &selected {
        // Every case starts with empty queues so rotation checks see only their own traffic
        {
            let mut state = ctx.backend_state.lock().unwrap();
            state.response_queue.clear();
            state.received_requests.clear();
        }

        print!("  {} {} ... ", "▶".bright_blue(), case.name.bright_white());
        let start = Instant::now();
        let outcome = (case.run)(ctx.clone()).await;
        let elapsed = start.elapsed().as_millis();

        match outcome {
            Ok(()) => println!("{} ({elapsed}ms)", "PASS".bright_green().bold()),
            Err(e) => {
                failed += 1;
                println!("{} ({elapsed}ms)", "FAIL".bright_red().bold());
                for (depth, cause) in e.chain().enumerate() {
                    let label = if depth == 0 { "Error:" } else { "Caused by:" };
                    println!("    {} {}", label.bright_red(), cause);
                }
            }
        }
    }

    let summary = format!("  Results: {} passed, {} failed", selected.len() - failed, failed);
    println!("\n{}", summary.bold());
    println!("{}\n", RULE.bright_blue());

    failed
}

/// Print every registered case
pub fn list_tests(cases: &[TestCase]) {
    println!("\n{}", "Available tests:".bright_white().bold());
    for case in cases {
        println!("  {} - {}", case.name.bright_cyan(), case.description);
    }
    println!();
}
