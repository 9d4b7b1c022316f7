//! Creates ledger rows for newly placed bets, priced at the oracle.

use binopt_core::{
    Bet, BetLedger, Direction, HoldingPeriod, InvariantViolation, LedgerError, OnChainRef, OptionId,
    PriceOracle,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::EngineError;

/// A bet as submitted by the placing client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBet {
    pub asset: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub holding_period: HoldingPeriod,
    pub transaction_hash: String,
    /// Known when the client waited for the creating receipt.
    pub option_id: Option<OptionId>,
}

pub struct BetRecorder {
    ledger: Arc<dyn BetLedger>,
    oracle: Arc<dyn PriceOracle>,
}

impl BetRecorder {
    #[must_use]
    pub fn new(ledger: Arc<dyn BetLedger>, oracle: Arc<dyn PriceOracle>) -> Self {
        Self { ledger, oracle }
    }

    /// Records `new_bet` with the current time as its creation instant.
    ///
    /// # Errors
    /// See [`BetRecorder::record_at`].
    pub async fn record(&self, new_bet: NewBet) -> Result<Bet, EngineError> {
        self.record_at(new_bet, Utc::now()).await
    }

    /// Records `new_bet`, or returns the bet already carrying its
    /// transaction hash.
    ///
    /// # Errors
    /// `Oracle` when no entry price is available (nothing is written), or a
    /// ledger error when the row is rejected.
    pub async fn record_at(&self, new_bet: NewBet, now: DateTime<Utc>) -> Result<Bet, EngineError> {
        if let Some(existing) = self
            .ledger
            .find_by_transaction_hash(&new_bet.transaction_hash)
            .await?
        {
            debug!(bet_id = %existing.id, tx_hash = %new_bet.transaction_hash, "Bet already recorded");
            return Ok(existing);
        }

        let asset = new_bet.asset.trim().to_uppercase();
        let entry_price = self.oracle.get_price(&asset).await?;

        let bet = Bet::new_active(
            asset,
            new_bet.direction,
            new_bet.stake,
            new_bet.holding_period,
            entry_price,
            OnChainRef {
                transaction_hash: new_bet.transaction_hash,
                option_id: new_bet.option_id,
                block_number: None,
            },
            now,
        );

        match self.ledger.save(&bet).await {
            Ok(()) => {}
            // A concurrent record of the same hash won the insert.
            Err(LedgerError::Invariant(InvariantViolation::DuplicateTransactionHash { .. })) => {
                if let Some(existing) = self
                    .ledger
                    .find_by_transaction_hash(bet.transaction_hash())
                    .await?
                {
                    return Ok(existing);
                }
                return Err(LedgerError::from(InvariantViolation::DuplicateTransactionHash {
                    tx_hash: bet.transaction_hash().to_string(),
                    existing: bet.id,
                })
                .into());
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            bet_id = %bet.id,
            tx_hash = bet.transaction_hash(),
            asset = %bet.asset,
            direction = %bet.direction,
            stake = %bet.stake,
            entry_price = %bet.entry_price,
            expires_at = %bet.expires_at,
            "Bet recorded"
        );
        Ok(bet)
    }
}
