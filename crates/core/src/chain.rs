//! Chain-side views the gateway hands back to the engine.
//!
//! These are decoded values: fixed-point integers are already converted to
//! decimals and addresses are lowercase `0x` hex.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bet::OptionId;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// State of an option as stored by the option contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionState {
    pub option_id: OptionId,
    pub trader: String,
    pub asset: String,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub payout: Decimal,
    pub expiry: DateTime<Utc>,
    pub is_up: bool,
    pub is_win: bool,
    pub executed: bool,
}

/// One log emitted by a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: Option<i64>,
    /// `false` when the transaction reverted.
    pub status: bool,
    pub logs: Vec<LogEntry>,
}

impl TxReceipt {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status
    }
}

/// Result of asking the node for a receipt; `Pending` is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptLookup {
    Pending,
    Mined(TxReceipt),
}

/// Latest price for an asset as reported by its feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub asset: String,
    pub price: Decimal,
    pub updated_at: DateTime<Utc>,
}
