use anyhow::{bail, Result};
use binopt_core::{AppConfig, BetLedger};
use clap::Args;
use uuid::Uuid;

use crate::context;

/// Look up a bet by ledger id or creating transaction hash.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ShowArgs {
    /// Ledger id of the bet
    #[arg(long)]
    pub id: Option<Uuid>,

    /// Hash of the creating transaction
    #[arg(long)]
    pub tx_hash: Option<String>,
}

pub async fn run_show(config: &AppConfig, args: ShowArgs) -> Result<()> {
    let ledger = context::ledger(config).await?;

    let bet = match (args.id, args.tx_hash.as_deref()) {
        (Some(id), _) => ledger.find_by_id(id).await?,
        (None, Some(tx_hash)) => ledger.find_by_transaction_hash(tx_hash).await?,
        (None, None) => bail!("either --id or --tx-hash is required"),
    };

    match bet {
        Some(bet) => println!("{}", serde_json::to_string_pretty(&bet)?),
        None => bail!("no such bet"),
    }
    Ok(())
}
