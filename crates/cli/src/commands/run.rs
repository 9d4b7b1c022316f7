use anyhow::{Context, Result};
use binopt_core::AppConfig;
use binopt_engine::{IdentifierResolver, SettlementScanner, SettlementScheduler};
use std::sync::Arc;
use tracing::info;

use crate::context;

/// Daemon mode: migrate, then run both periodic tasks until Ctrl-C.
pub async fn run_daemon(config: &AppConfig) -> Result<()> {
    info!(rpc_url = %config.chain.rpc_url, contract = %config.chain.contract_address, "Starting settlement daemon");

    let ledger = context::ledger(config).await?;
    ledger
        .migrate()
        .await
        .context("Failed to apply migrations at startup")?;
    let chain = context::chain(config)?;

    let scanner = Arc::new(SettlementScanner::new(ledger.clone(), chain.gateway.clone()));
    let resolver = Arc::new(IdentifierResolver::new(ledger, chain.gateway));

    SettlementScheduler::new(scanner, resolver, config.scheduler.clone())
        .run_until_shutdown()
        .await?;

    info!("Settlement daemon stopped");
    Ok(())
}
