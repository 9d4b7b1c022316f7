//! Pending-identifier resolver: fills in the option id of bets recorded before
//! their creating transaction confirmed.

use binopt_core::{Bet, BetLedger, ChainGateway, ReceiptLookup, Settlement};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub examined: usize,
    pub resolved: usize,
    /// Receipt not mined yet.
    pub pending: usize,
    /// Creating transaction reverted; bet closed as never placed.
    pub failed: usize,
    /// Mined and successful, but no creation event in the logs.
    pub anomalies: usize,
    pub errors: usize,
    pub aborted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Resolved,
    Pending,
    Failed,
    Anomaly,
}

pub struct IdentifierResolver {
    ledger: Arc<dyn BetLedger>,
    chain: Arc<dyn ChainGateway>,
}

impl IdentifierResolver {
    #[must_use]
    pub fn new(ledger: Arc<dyn BetLedger>, chain: Arc<dyn ChainGateway>) -> Self {
        Self { ledger, chain }
    }

    /// Runs one pass over ACTIVE bets that still lack an option id.
    ///
    /// # Errors
    /// Only when the ledger cannot be queried.
    pub async fn tick(&self) -> Result<ResolveReport, EngineError> {
        let bets = self.ledger.find_active_without_option_id().await?;
        let mut report = ResolveReport::default();

        for bet in &bets {
            report.examined += 1;
            match self.resolve(bet).await {
                Ok(Resolution::Resolved) => report.resolved += 1,
                Ok(Resolution::Pending) => report.pending += 1,
                Ok(Resolution::Failed) => report.failed += 1,
                Ok(Resolution::Anomaly) => report.anomalies += 1,
                Err(err) if err.is_systemic() => {
                    error!(
                        bet_id = %bet.id,
                        tx_hash = bet.transaction_hash(),
                        error = %err,
                        "Systemic failure, aborting resolver tick"
                    );
                    report.aborted = true;
                    break;
                }
                Err(err) => {
                    report.errors += 1;
                    warn!(bet_id = %bet.id, tx_hash = bet.transaction_hash(), error = %err, "Resolution failed");
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                resolved = report.resolved,
                pending = report.pending,
                failed = report.failed,
                anomalies = report.anomalies,
                errors = report.errors,
                aborted = report.aborted,
                "Resolver tick complete"
            );
        }
        Ok(report)
    }

    async fn resolve(&self, bet: &Bet) -> Result<Resolution, EngineError> {
        let receipt = match self.chain.get_transaction_receipt(bet.transaction_hash()).await? {
            ReceiptLookup::Pending => {
                debug!(bet_id = %bet.id, tx_hash = bet.transaction_hash(), "Creating transaction not mined yet");
                return Ok(Resolution::Pending);
            }
            ReceiptLookup::Mined(receipt) => receipt,
        };

        let mut updated = bet.clone();

        if !receipt.succeeded() {
            updated.finalize(Settlement::never_placed());
            self.ledger.save(&updated).await?;
            warn!(
                bet_id = %bet.id,
                tx_hash = bet.transaction_hash(),
                block = ?receipt.block_number,
                "Creating transaction failed, bet closed as never placed"
            );
            return Ok(Resolution::Failed);
        }

        let Some(option_id) = self.chain.extract_option_id(&receipt) else {
            warn!(
                bet_id = %bet.id,
                tx_hash = bet.transaction_hash(),
                logs = receipt.logs.len(),
                "Receipt has no option creation event"
            );
            return Ok(Resolution::Anomaly);
        };

        updated.on_chain.option_id = Some(option_id);
        updated.on_chain.block_number = receipt.block_number;
        self.ledger.save(&updated).await?;

        info!(
            bet_id = %bet.id,
            tx_hash = bet.transaction_hash(),
            %option_id,
            block = ?receipt.block_number,
            "Option id resolved"
        );
        Ok(Resolution::Resolved)
    }
}
