use anyhow::{Context, Result};
use binopt_core::AppConfig;

use crate::context;

pub async fn run_migrate(config: &AppConfig) -> Result<()> {
    let ledger = context::ledger(config).await?;
    ledger.migrate().await.context("Failed to apply migrations")?;
    println!("Migrations applied.");
    Ok(())
}
