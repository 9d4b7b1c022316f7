//! Settlement scanner: drives expired bets to settlement and reconciles the
//! on-chain outcome into the ledger.
//!
//! Every decision re-reads the option immediately before acting, so a tick
//! replayed after a crash converges on the same terminal state without a
//! second submission for an executed option.

use binopt_core::{Bet, BetLedger, BetResult, ChainError, ChainGateway, OptionId, Settlement};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::outcome::settlement_from_chain;

/// Counters for one scanner tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub examined: usize,
    /// No option id yet; left for the resolver.
    pub skipped: usize,
    pub won: usize,
    pub lost: usize,
    pub drawn: usize,
    pub invalid: usize,
    pub errored: usize,
    /// Per-bet failures that left the bet ACTIVE.
    pub failed: usize,
    /// A systemic failure stopped the tick early.
    pub aborted: bool,
}

impl ScanReport {
    fn record(&mut self, settlement: &Settlement) {
        match settlement.result {
            BetResult::Win => self.won += 1,
            BetResult::Loss => self.lost += 1,
            BetResult::Draw => self.drawn += 1,
            BetResult::Invalid => self.invalid += 1,
            BetResult::Error => self.errored += 1,
        }
    }

    #[must_use]
    pub fn settled(&self) -> usize {
        self.won + self.lost + self.drawn + self.invalid + self.errored
    }
}

pub struct SettlementScanner {
    ledger: Arc<dyn BetLedger>,
    chain: Arc<dyn ChainGateway>,
}

impl SettlementScanner {
    #[must_use]
    pub fn new(ledger: Arc<dyn BetLedger>, chain: Arc<dyn ChainGateway>) -> Self {
        Self { ledger, chain }
    }

    /// Runs one pass over ACTIVE bets whose holding period ended by `now`.
    ///
    /// # Errors
    /// Only when the ledger cannot be queried; per-bet failures are counted
    /// in the report.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<ScanReport, EngineError> {
        let bets = self.ledger.find_active_and_expired(now).await?;
        let mut report = ScanReport::default();

        for bet in &bets {
            report.examined += 1;
            match self.process(bet).await {
                Ok(Some(settlement)) => report.record(&settlement),
                Ok(None) => report.skipped += 1,
                Err(err) if err.is_systemic() => {
                    error!(
                        bet_id = %bet.id,
                        option_id = ?bet.option_id(),
                        tx_hash = bet.transaction_hash(),
                        error = %err,
                        remaining = bets.len() - report.examined,
                        "Systemic failure, aborting settlement tick"
                    );
                    report.aborted = true;
                    break;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        bet_id = %bet.id,
                        option_id = ?bet.option_id(),
                        tx_hash = bet.transaction_hash(),
                        error = %err,
                        "Settlement failed, bet stays active"
                    );
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                skipped = report.skipped,
                won = report.won,
                lost = report.lost,
                drawn = report.drawn,
                invalid = report.invalid,
                errored = report.errored,
                failed = report.failed,
                aborted = report.aborted,
                "Settlement tick complete"
            );
        }
        Ok(report)
    }

    /// Settles one bet; `None` when it has no option id yet.
    async fn process(&self, bet: &Bet) -> Result<Option<Settlement>, EngineError> {
        let Some(option_id) = bet.option_id() else {
            debug!(bet_id = %bet.id, tx_hash = bet.transaction_hash(), "No option id yet, skipping");
            return Ok(None);
        };

        let settlement = match self.chain.read_option(option_id).await {
            Err(ChainError::OptionNotFound { .. }) => {
                warn!(bet_id = %bet.id, %option_id, "Option does not exist on-chain, marking invalid");
                Settlement::invalid()
            }
            Err(err) => return Err(err.into()),
            Ok(option) if option.executed => settlement_from_chain(bet, &option),
            Ok(_) => self.submit(bet, option_id).await?,
        };

        let mut updated = bet.clone();
        updated.finalize(settlement);
        self.ledger.save(&updated).await?;

        info!(
            bet_id = %bet.id,
            %option_id,
            status = %settlement.status,
            result = %settlement.result,
            payout = %settlement.payout,
            "Bet settled"
        );
        Ok(Some(settlement))
    }

    async fn submit(&self, bet: &Bet, option_id: OptionId) -> Result<Settlement, EngineError> {
        match self.chain.submit_settlement(option_id).await {
            Ok(receipt) => {
                debug!(bet_id = %bet.id, %option_id, tx_hash = %receipt.tx_hash, "Settlement submitted");
                self.reread_executed(bet, option_id).await
            }
            Err(ChainError::AlreadySettled { .. }) => {
                debug!(bet_id = %bet.id, %option_id, "Option settled elsewhere, re-reading");
                self.reread_executed(bet, option_id).await
            }
            Err(err @ (ChainError::OptionNotFound { .. } | ChainError::SubmissionFailed { .. })) => {
                error!(
                    bet_id = %bet.id,
                    %option_id,
                    tx_hash = bet.transaction_hash(),
                    error = %err,
                    "Settlement submission rejected, needs manual follow-up"
                );
                Ok(Settlement::submission_error())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn reread_executed(&self, bet: &Bet, option_id: OptionId) -> Result<Settlement, EngineError> {
        let option = self.chain.read_option(option_id).await?;
        if !option.executed {
            return Err(EngineError::Inconsistent {
                bet_id: bet.id,
                reason: format!("option {option_id} still not executed after settlement"),
            });
        }
        Ok(settlement_from_chain(bet, &option))
    }
}
