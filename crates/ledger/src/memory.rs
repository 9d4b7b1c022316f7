//! In-process ledger for tests and dry runs.

use async_trait::async_trait;
use binopt_core::{validate_transition, Bet, BetLedger, InvariantViolation, LedgerError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::sort_for_processing;

/// [`BetLedger`] backed by a map, with the same write rules as PostgreSQL.
#[derive(Debug, Default)]
pub struct InMemoryBetLedger {
    bets: Mutex<HashMap<Uuid, Bet>>,
}

impl InMemoryBetLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored bet, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<Bet> {
        let mut bets: Vec<Bet> = self.bets.lock().values().cloned().collect();
        bets.sort_by_key(|b| (b.created_at, b.id));
        bets
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bets.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bets.lock().is_empty()
    }

    fn select(&self, predicate: impl Fn(&Bet) -> bool) -> Vec<Bet> {
        let mut bets: Vec<Bet> = self
            .bets
            .lock()
            .values()
            .filter(|b| predicate(b))
            .cloned()
            .collect();
        sort_for_processing(&mut bets);
        bets
    }
}

#[async_trait]
impl BetLedger for InMemoryBetLedger {
    async fn find_active_and_expired(&self, now: DateTime<Utc>) -> Result<Vec<Bet>, LedgerError> {
        Ok(self.select(|b| b.is_active() && b.is_expired_at(now)))
    }

    async fn find_active_without_option_id(&self) -> Result<Vec<Bet>, LedgerError> {
        Ok(self.select(|b| b.is_active() && b.option_id().is_none()))
    }

    async fn find_by_transaction_hash(&self, tx_hash: &str) -> Result<Option<Bet>, LedgerError> {
        Ok(self
            .bets
            .lock()
            .values()
            .find(|b| b.transaction_hash() == tx_hash)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Bet>, LedgerError> {
        Ok(self.bets.lock().get(&id).cloned())
    }

    async fn save(&self, bet: &Bet) -> Result<(), LedgerError> {
        let mut bets = self.bets.lock();
        let previous = bets.get(&bet.id);
        validate_transition(previous, bet)?;

        if previous.is_none() {
            if let Some(existing) = bets
                .values()
                .find(|b| b.transaction_hash() == bet.transaction_hash())
            {
                return Err(InvariantViolation::DuplicateTransactionHash {
                    tx_hash: bet.transaction_hash().to_string(),
                    existing: existing.id,
                }
                .into());
            }
        }

        bets.insert(bet.id, bet.clone());
        Ok(())
    }
}
