use anyhow::{Context, Result};
use binopt_core::{AppConfig, Direction, HoldingPeriod, OptionId};
use binopt_engine::{BetRecorder, NewBet};
use clap::Args;
use rust_decimal::Decimal;

use crate::context;

/// Arguments for recording a placed bet.
#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Underlying asset symbol (e.g., BTC)
    #[arg(long)]
    pub asset: String,

    /// up or down
    #[arg(long)]
    pub direction: Direction,

    /// Stake in base-asset units
    #[arg(long)]
    pub stake: Decimal,

    /// One of 1m, 5m, 15m, 30m, 1h, 4h, 1d
    #[arg(long)]
    pub period: HoldingPeriod,

    /// Hash of the creating transaction
    #[arg(long)]
    pub tx_hash: String,

    /// Option id, if the creating receipt is already known
    #[arg(long)]
    pub option_id: Option<OptionId>,
}

pub async fn run_record(config: &AppConfig, args: RecordArgs) -> Result<()> {
    let ledger = context::ledger(config).await?;
    let chain = context::chain(config)?;
    let recorder = BetRecorder::new(ledger, chain.oracle);

    let bet = recorder
        .record(NewBet {
            asset: args.asset,
            direction: args.direction,
            stake: args.stake,
            holding_period: args.period,
            transaction_hash: args.tx_hash,
            option_id: args.option_id,
        })
        .await
        .context("Failed to record bet")?;

    println!("{}", serde_json::to_string_pretty(&bet)?);
    Ok(())
}
