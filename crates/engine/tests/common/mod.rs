//! Scripted chain and oracle for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use binopt_core::{
    Bet, BetLedger, ChainError, ChainGateway, Direction, HoldingPeriod, LogEntry, OnChainRef,
    OptionId, OptionState, OracleError, PriceOracle, PriceQuote, ReceiptLookup, TxReceipt,
};
use binopt_ledger::InMemoryBetLedger;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_750_000_000, 0).unwrap()
}

/// Comfortably past every holding period used in these tests.
pub fn later() -> DateTime<Utc> {
    t0() + Duration::hours(2)
}

pub fn bet(tx_hash: &str, option_id: Option<u128>) -> Bet {
    Bet::new_active(
        "BTC",
        Direction::Up,
        dec!(10),
        HoldingPeriod::FiveMinutes,
        dec!(100),
        OnChainRef {
            transaction_hash: tx_hash.to_string(),
            option_id: option_id.map(OptionId::new),
            block_number: option_id.map(|_| 1),
        },
        t0(),
    )
}

pub async fn seed(ledger: &InMemoryBetLedger, tx_hash: &str, option_id: Option<u128>) -> Bet {
    let b = bet(tx_hash, option_id);
    ledger.save(&b).await.unwrap();
    b
}

/// An on-chain option. `exit_price`, `is_win` and `payout` are what the
/// contract reports once executed.
pub fn option(id: u128, entry: Decimal, exit: Decimal, is_win: bool, payout: Decimal) -> OptionState {
    OptionState {
        option_id: OptionId::new(id),
        trader: "0x00000000000000000000000000000000000000b0".into(),
        asset: "BTC".into(),
        amount: dec!(10),
        entry_price: entry,
        exit_price: exit,
        payout,
        expiry: t0() + Duration::minutes(5),
        is_up: true,
        is_win,
        executed: false,
    }
}

pub fn mined(tx_hash: &str, succeeded: bool, created_option: Option<u128>) -> ReceiptLookup {
    ReceiptLookup::Mined(TxReceipt {
        tx_hash: tx_hash.to_string(),
        block_number: Some(55),
        status: succeeded,
        logs: created_option
            .map(|id| LogEntry {
                address: "0x00000000000000000000000000000000000000c0".into(),
                topics: vec!["created".into()],
                data: id.to_string(),
            })
            .into_iter()
            .collect(),
    })
}

#[derive(Default)]
struct ChainState {
    options: HashMap<OptionId, OptionState>,
    receipts: HashMap<String, ReceiptLookup>,
    read_failures: VecDeque<ChainError>,
    submit_failures: HashMap<OptionId, ChainError>,
    submissions: usize,
    submit_attempts: usize,
}

/// In-process [`ChainGateway`]. Every call yields once so concurrent callers
/// interleave the way they would around real network I/O.
#[derive(Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_option(&self, option: OptionState) {
        self.state.lock().options.insert(option.option_id, option);
    }

    pub fn put_executed(&self, mut option: OptionState) {
        option.executed = true;
        self.put_option(option);
    }

    pub fn put_receipt(&self, tx_hash: &str, receipt: ReceiptLookup) {
        self.state.lock().receipts.insert(tx_hash.to_string(), receipt);
    }

    /// Queues an error for the next `read_option` call.
    pub fn fail_next_read(&self, err: ChainError) {
        self.state.lock().read_failures.push_back(err);
    }

    pub fn fail_submit(&self, id: u128, err: ChainError) {
        self.state.lock().submit_failures.insert(OptionId::new(id), err);
    }

    /// Transactions that actually executed an option.
    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }

    pub fn submit_attempts(&self) -> usize {
        self.state.lock().submit_attempts
    }

    pub fn option_state(&self, id: u128) -> Option<OptionState> {
        self.state.lock().options.get(&OptionId::new(id)).cloned()
    }
}

#[async_trait]
impl ChainGateway for FakeChain {
    async fn submit_settlement(&self, option_id: OptionId) -> Result<TxReceipt, ChainError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.submit_attempts += 1;
        if let Some(err) = state.submit_failures.get(&option_id) {
            return Err(err.clone());
        }
        let submissions = state.submissions;
        let Some(option) = state.options.get_mut(&option_id) else {
            return Err(ChainError::OptionNotFound { option_id });
        };
        if option.executed {
            return Err(ChainError::AlreadySettled { option_id });
        }
        option.executed = true;
        state.submissions = submissions + 1;
        Ok(TxReceipt {
            tx_hash: format!("0xsettle{option_id}"),
            block_number: Some(99),
            status: true,
            logs: Vec::new(),
        })
    }

    async fn read_option(&self, option_id: OptionId) -> Result<OptionState, ChainError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        if let Some(err) = state.read_failures.pop_front() {
            return Err(err);
        }
        state
            .options
            .get(&option_id)
            .cloned()
            .ok_or(ChainError::OptionNotFound { option_id })
    }

    async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<ReceiptLookup, ChainError> {
        tokio::task::yield_now().await;
        Ok(self
            .state
            .lock()
            .receipts
            .get(tx_hash)
            .cloned()
            .unwrap_or(ReceiptLookup::Pending))
    }

    fn extract_option_id(&self, receipt: &TxReceipt) -> Option<OptionId> {
        receipt
            .logs
            .iter()
            .find(|log| log.topics.first().map(String::as_str) == Some("created"))
            .and_then(|log| log.data.parse().ok())
    }
}

#[derive(Default)]
pub struct FakeOracle {
    prices: Mutex<HashMap<String, Decimal>>,
    calls: Mutex<usize>,
}

impl FakeOracle {
    pub fn with_price(asset: &str, price: Decimal) -> Self {
        let oracle = Self::default();
        oracle.prices.lock().insert(asset.to_string(), price);
        oracle
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl PriceOracle for FakeOracle {
    async fn quote(&self, asset: &str) -> Result<PriceQuote, OracleError> {
        *self.calls.lock() += 1;
        let price = self
            .prices
            .lock()
            .get(asset)
            .copied()
            .ok_or_else(|| OracleError::unavailable(asset, "feed down"))?;
        Ok(PriceQuote {
            asset: asset.to_string(),
            price,
            updated_at: t0(),
        })
    }
}
