//! Load balancer backend sync daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌───────────┐    ┌────────────┐    ┌──────────────────────────────┐
//!   │ inventory │───▶│ controller │───▶│ reconciler                   │
//!   │ NodeList  │    │ tick/lock/ │    │  list → diff → create/delete │
//!   └───────────┘    │  backoff   │    └──────────────┬───────────────┘
//!                    └────────────┘                   │
//!                                                     ▼
//!                                        ┌──────────────────────────┐
//!                                        │ registry (SLB REST API)  │
//!                                        │  session → bearer token  │
//!                                        └──────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use lb_backend_sync::config::load_config;
use lb_backend_sync::inventory::NodeInventory;
use lb_backend_sync::lifecycle::{signals, startup, Shutdown};
use lb_backend_sync::observability::{logging, metrics};
use lb_backend_sync::{PassOutcome, Reconciler};

#[derive(Parser)]
#[command(name = "lb-backend-sync")]
#[command(about = "Keep load balancer backend pools in sync with cluster nodes", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "/etc/lb-sync/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile on an interval until SIGINT/SIGTERM
    Run,
    /// Run a single pass for every listener
    Once,
    /// Show what a pass would change, without changing anything
    Plan,
    /// Validate the configuration and print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability);

    tracing::info!(
        config = ?cli.config,
        listeners = config.listeners.len(),
        "lb-backend-sync v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    match cli.command {
        Commands::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Plan => {
            let registry = Arc::new(startup::build_registry(&config)?);
            let nodes = startup::build_inventory(&config).snapshot().await?;
            let reconciler = Reconciler::new(registry);

            let mut plans = BTreeMap::new();
            for listener in config.listener_refs() {
                let plan = reconciler.plan(&listener, &nodes).await?;
                plans.insert(listener.to_string(), plan);
            }
            println!("{}", serde_json::to_string_pretty(&plans)?);
        }
        Commands::Once => {
            let controller = Arc::new(startup::build_controller(&config)?);
            let outcomes = controller.tick().await?;

            let failed = outcomes.iter().filter(|(_, o)| o.is_failure()).count();
            for (listener, outcome) in &outcomes {
                match outcome {
                    PassOutcome::Reconciled(report) => println!(
                        "{}: registered={} added={} deleted={} skipped={}",
                        listener, report.registered, report.added, report.deleted, report.skipped
                    ),
                    PassOutcome::Failed(e) => eprintln!("{}: {}", listener, e),
                    PassOutcome::Busy | PassOutcome::BackingOff => {}
                }
            }
            if failed > 0 {
                return Err(format!("{} of {} listeners failed", failed, outcomes.len()).into());
            }
        }
        Commands::Run => {
            if config.observability.metrics_enabled {
                match config.observability.metrics_address.parse() {
                    Ok(addr) => metrics::init_metrics(addr),
                    Err(_) => tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        "Failed to parse metrics address"
                    ),
                }
            }

            let controller = Arc::new(startup::build_controller(&config)?);
            let shutdown = Shutdown::new();
            let loop_shutdown = shutdown.subscribe();
            signals::spawn_signal_handler(shutdown);

            controller.run(loop_shutdown).await;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
