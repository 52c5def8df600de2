//! walletcore Simulator
//!
//! Load and scenario environment for exercising the ledger engine under
//! concurrent traffic.

use clap::Parser;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// walletcore Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "walletcore load and scenario simulation environment")]
struct Args {
    /// Number of accounts to seed
    #[arg(short, long, default_value = "4")]
    accounts: usize,

    /// Concurrent worker tasks for random load
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// Run duration in seconds (random load mode)
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// Balance each account starts with
    #[arg(long, default_value = "1000.00")]
    initial_balance: String,

    /// Scenario to run instead of random load
    #[arg(short, long)]
    scenario: Option<String>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let initial_balance = Decimal::from_str_exact(&args.initial_balance)?;

    info!("Starting walletcore Simulator");
    info!("Accounts: {}", args.accounts);
    info!("Workers: {}", args.workers);

    let mut controller =
        SimulationController::new(args.accounts, initial_balance, args.seed);
    controller.initialize()?;

    if let Some(scenario_name) = &args.scenario {
        info!("Running scenario: {}", scenario_name);

        let scenario = Scenario::load(scenario_name)?;
        controller.run_scenario(scenario).await?;
    } else {
        controller
            .run_load(args.workers, std::time::Duration::from_secs(args.duration))
            .await?;
    }

    controller.verify().await?;

    let metrics = controller.metrics().await;
    info!("Simulation complete");
    info!("Total operations: {}", metrics.total_operations);
    info!("Succeeded: {}", metrics.succeeded);
    info!("Insufficient funds: {}", metrics.insufficient_funds);
    info!("Conflicts: {}", metrics.conflicts);
    info!("Other failures: {}", metrics.failed);
    info!("Average latency: {}ms", metrics.average_latency_ms());
    info!("p99 latency: {}ms", metrics.p99_latency_ms());

    Ok(())
}
