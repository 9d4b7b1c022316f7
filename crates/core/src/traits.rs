use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::bet::{Bet, OptionId};
use crate::chain::{OptionState, PriceQuote, ReceiptLookup, TxReceipt};
use crate::error::{ChainError, LedgerError, OracleError};

/// Sole owner of on-chain interaction. Implementations gate every call
/// through a shared rate budget.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Submits the execute transaction for `option_id` and waits for its
    /// receipt.
    async fn submit_settlement(&self, option_id: OptionId) -> Result<TxReceipt, ChainError>;

    async fn read_option(&self, option_id: OptionId) -> Result<OptionState, ChainError>;

    async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<ReceiptLookup, ChainError>;

    /// Parses the creation event out of a receipt's logs.
    fn extract_option_id(&self, receipt: &TxReceipt) -> Option<OptionId>;
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn quote(&self, asset: &str) -> Result<PriceQuote, OracleError>;

    async fn get_price(&self, asset: &str) -> Result<Decimal, OracleError> {
        Ok(self.quote(asset).await?.price)
    }
}

/// Persisted record of every bet. `save` validates the lifecycle invariants
/// against the stored row before writing.
#[async_trait]
pub trait BetLedger: Send + Sync {
    async fn find_active_and_expired(&self, now: DateTime<Utc>) -> Result<Vec<Bet>, LedgerError>;

    async fn find_active_without_option_id(&self) -> Result<Vec<Bet>, LedgerError>;

    async fn find_by_transaction_hash(&self, tx_hash: &str) -> Result<Option<Bet>, LedgerError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Bet>, LedgerError>;

    async fn save(&self, bet: &Bet) -> Result<(), LedgerError>;
}
