//! One-shot ticks, for cron-driven deployments and manual catch-up.

use anyhow::Result;
use binopt_core::AppConfig;
use binopt_engine::{IdentifierResolver, SettlementScanner};
use chrono::Utc;

use crate::context;

pub async fn run_scan(config: &AppConfig) -> Result<()> {
    let ledger = context::ledger(config).await?;
    let chain = context::chain(config)?;

    let report = SettlementScanner::new(ledger, chain.gateway)
        .tick(Utc::now())
        .await?;

    println!(
        "Examined {}: {} won, {} lost, {} drawn, {} invalid, {} error, {} skipped, {} failed",
        report.examined,
        report.won,
        report.lost,
        report.drawn,
        report.invalid,
        report.errored,
        report.skipped,
        report.failed
    );
    if report.aborted {
        anyhow::bail!("settlement tick aborted on a systemic failure; remaining bets stay active");
    }
    Ok(())
}

pub async fn run_resolve(config: &AppConfig) -> Result<()> {
    let ledger = context::ledger(config).await?;
    let chain = context::chain(config)?;

    let report = IdentifierResolver::new(ledger, chain.gateway).tick().await?;

    println!(
        "Examined {}: {} resolved, {} pending, {} failed, {} anomalies, {} errors",
        report.examined,
        report.resolved,
        report.pending,
        report.failed,
        report.anomalies,
        report.errors
    );
    if report.aborted {
        anyhow::bail!("resolver tick aborted on a systemic failure");
    }
    Ok(())
}
