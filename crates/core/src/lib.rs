pub mod bet;
pub mod chain;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod invariants;
pub mod traits;

pub use bet::{
    Bet, BetResult, BetStatus, Direction, HoldingPeriod, OnChainRef, OptionId, Settlement,
};
pub use chain::{LogEntry, OptionState, PriceQuote, ReceiptLookup, TxReceipt, ZERO_ADDRESS};
pub use config::{
    AppConfig, ChainConfig, ConfigError, DatabaseConfig, FeedConfig, LoggingConfig, OracleConfig,
    RateLimitConfig, SchedulerConfig,
};
pub use config_loader::ConfigLoader;
pub use error::{ChainError, InvariantViolation, LedgerError, OracleError, ParseEnumError};
pub use invariants::validate_transition;
pub use traits::{BetLedger, ChainGateway, PriceOracle};
