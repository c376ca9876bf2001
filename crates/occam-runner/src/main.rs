//! Occam workload runner
//!
//! Runs a seeded transfer batch through the optimistic scheduler and through
//! sequential execution, checks that both agree, and prints a JSON summary.

mod cli;
mod workload;

use anyhow::{bail, Result};
use cli::Cli;
use occam_scheduler::{Context, MetricsSnapshot, MvMemory, ReadWriteSetValidator, Scheduler};
use serde::Serialize;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use workload::{genesis, TransferExecutor};

/// Printed on stdout once the run completes
#[derive(Debug, Serialize)]
struct RunSummary {
    transactions: usize,
    accounts: u32,
    workers: i64,
    seed: u64,
    successful_transfers: usize,
    rounds: u32,
    retries: usize,
    parallel_us: u128,
    sequential_us: u128,
    matches_sequential: bool,
    metrics: MetricsSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = cli.scheduler_config()?;
    let transfers = workload::generate(cli.transactions, cli.accounts, cli.max_amount, cli.seed);
    tracing::info!(
        transactions = transfers.len(),
        accounts = cli.accounts,
        seed = cli.seed,
        "Generated transfer workload"
    );

    let workers = config.workers;
    let scheduler = Scheduler::new(TransferExecutor::new(cli.accounts), config)
        .with_validator(ReadWriteSetValidator);

    // Parallel run, cancelled on Ctrl+C
    let base = genesis(cli.accounts, cli.initial_balance);
    let parallel_ctx = Context::new(MvMemory::with_base(base.clone()));
    let token = parallel_ctx.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            token.cancel();
        }
    });

    let started = Instant::now();
    let (parallel, report) = scheduler
        .process_all_with_report(&parallel_ctx, transfers.clone())
        .await?;
    let parallel_us = started.elapsed().as_micros();

    // Sequential baseline on a fresh copy of the initial state
    let sequential_ctx = Context::new(MvMemory::with_base(base));
    let started = Instant::now();
    let sequential = scheduler.execute_sequential(&sequential_ctx, transfers)?;
    let sequential_us = started.elapsed().as_micros();

    let matches_sequential = parallel == sequential
        && parallel_ctx.state().snapshot() == sequential_ctx.state().snapshot();

    let summary = RunSummary {
        transactions: report.transactions,
        accounts: cli.accounts,
        workers,
        seed: cli.seed,
        successful_transfers: parallel.iter().filter(|r| r.success).count(),
        rounds: report.rounds,
        retries: report.retries,
        parallel_us,
        sequential_us,
        matches_sequential,
        metrics: scheduler.metrics().snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !matches_sequential {
        tracing::error!("Parallel execution diverged from sequential execution");
        bail!("parallel execution diverged from sequential execution");
    }

    tracing::info!(rounds = report.rounds, retries = report.retries, "Workload complete");
    Ok(())
}
