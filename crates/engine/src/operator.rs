//! Manual interventions.

use binopt_core::{BetLedger, Settlement};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::EngineError;

pub struct OperatorActions {
    ledger: Arc<dyn BetLedger>,
}

impl OperatorActions {
    #[must_use]
    pub fn new(ledger: Arc<dyn BetLedger>) -> Self {
        Self { ledger }
    }

    /// Closes an ACTIVE bet whose creating transaction never confirmed.
    ///
    /// The bet becomes EXPIRED / LOSS with no payout. Bets that already have
    /// an option id are refused: their outcome belongs to the chain.
    ///
    /// # Errors
    /// `BetNotFound`, `AlreadyTerminal`, `ForceExpireRefused`, or a ledger
    /// failure.
    pub async fn force_expire(&self, bet_id: Uuid) -> Result<Settlement, EngineError> {
        let mut bet = self
            .ledger
            .find_by_id(bet_id)
            .await?
            .ok_or(EngineError::BetNotFound(bet_id))?;

        if !bet.is_active() {
            return Err(EngineError::AlreadyTerminal {
                bet_id,
                status: bet.status,
            });
        }

        if let Some(option_id) = bet.option_id() {
            return Err(EngineError::ForceExpireRefused {
                bet_id,
                reason: format!("option {option_id} exists on-chain, settle it through the scanner"),
            });
        }

        let settlement = Settlement::never_placed();
        bet.finalize(settlement);
        self.ledger.save(&bet).await?;

        warn!(
            bet_id = %bet_id,
            tx_hash = bet.transaction_hash(),
            "Bet force-expired by operator"
        );
        Ok(settlement)
    }
}
