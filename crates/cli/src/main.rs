//! `entitlekit` - inspect entitlements and replay transaction batches locally.
//!
//! Uses the same manager wiring as an application would, with an in-memory
//! payment queue and catalog standing in for the platform backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use entitlekit_entitlements::{
    EntitlementStatus, PaymentTransaction, SimulationMode, TransactionStatus,
};
use entitlekit_infra::in_memory::{InMemoryPaymentQueue, InMemoryProductCatalog};
use entitlekit_infra::{BatchOutcome, Collaborators, EntitlementConfig, EntitlementManager};

#[derive(Parser, Debug)]
#[command(name = "entitlekit")]
#[command(about = "Derive pro-access entitlements from a local purchase record", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Purchase record to read (overrides ENTITLEKIT_RECEIPT_PATH)
    #[arg(long, global = true)]
    record: Option<PathBuf>,

    /// Simulated purchase scenario (overrides IN_APP_PURCHASE)
    #[arg(long, global = true)]
    simulate: Option<SimulationMode>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the current entitlement status as JSON
    Status,

    /// Feed a JSON array of transactions through the processor
    Replay {
        /// File containing `[{"id", "product_id", "state", "error"?}, ...]`
        batch: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct StatusReport {
    entitlement: EntitlementStatus,
    pro_access: bool,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    outcome: BatchOutcome,
    transaction: TransactionStatus,
    entitlement: EntitlementStatus,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = EntitlementConfig::from_env();
    entitlekit_observability::init_with(config.log_format);

    if cli.record.is_some() {
        config.receipt_path = cli.record;
    }
    if cli.simulate.is_some() {
        config.simulation = cli.simulate;
    }

    let collaborators = Collaborators::with_defaults(
        &config,
        Arc::new(InMemoryPaymentQueue::new()),
        Arc::new(InMemoryProductCatalog::new()),
    );
    let manager = EntitlementManager::new(&config, collaborators);

    match cli.command {
        Commands::Status => {
            let entitlement = manager.entitlement_status();
            print_json(&StatusReport {
                entitlement,
                pro_access: entitlement.grants_pro_access(),
            })
        }
        Commands::Replay { batch } => {
            let raw = std::fs::read(&batch)
                .with_context(|| format!("failed to read {}", batch.display()))?;
            let transactions: Vec<PaymentTransaction> = serde_json::from_slice(&raw)
                .with_context(|| format!("{} is not a transaction batch", batch.display()))?;

            tracing::info!(count = transactions.len(), "replaying transaction batch");
            let outcome = manager.process_transactions(&transactions);

            print_json(&ReplayReport {
                outcome,
                transaction: manager.transaction_status(),
                entitlement: manager.entitlement_status(),
            })
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
