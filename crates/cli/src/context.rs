//! Wiring of concrete collaborators from configuration.

use anyhow::{Context, Result};
use binopt_chain::{ChainlinkOracle, EvmChainGateway};
use binopt_core::AppConfig;
use binopt_ledger::PgBetLedger;
use std::sync::Arc;
use tracing::info;

pub async fn ledger(config: &AppConfig) -> Result<Arc<PgBetLedger>> {
    let ledger = PgBetLedger::connect(&config.database)
        .await
        .context("Failed to connect to the ledger database")?;
    Ok(Arc::new(ledger))
}

pub struct Chain {
    pub gateway: Arc<EvmChainGateway>,
    pub oracle: Arc<ChainlinkOracle>,
}

pub fn chain(config: &AppConfig) -> Result<Chain> {
    let (gateway, oracle) =
        binopt_chain::connect(config).context("Failed to set up chain access")?;
    info!(chain_id = config.chain.chain_id, feeds = ?oracle.assets(), "Chain access ready");

    Ok(Chain {
        gateway: Arc::new(gateway),
        oracle: Arc::new(oracle),
    })
}
