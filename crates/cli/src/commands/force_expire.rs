use anyhow::{Context, Result};
use binopt_core::AppConfig;
use binopt_engine::OperatorActions;
use clap::Args;
use uuid::Uuid;

use crate::context;

/// Arguments for force-expiring a stuck bet.
#[derive(Args, Debug)]
pub struct ForceExpireArgs {
    /// Ledger id of the bet
    pub bet_id: Uuid,
}

pub async fn run_force_expire(config: &AppConfig, args: ForceExpireArgs) -> Result<()> {
    let ledger = context::ledger(config).await?;

    let settlement = OperatorActions::new(ledger)
        .force_expire(args.bet_id)
        .await
        .with_context(|| format!("Failed to force-expire bet {}", args.bet_id))?;

    println!(
        "Bet {} is now {} / {} (payout {})",
        args.bet_id, settlement.status, settlement.result, settlement.payout
    );
    Ok(())
}
