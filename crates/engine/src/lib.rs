pub mod error;
pub mod operator;
pub mod outcome;
pub mod recorder;
pub mod resolver;
pub mod scanner;
pub mod scheduler;

pub use error::EngineError;
pub use operator::OperatorActions;
pub use outcome::settlement_from_chain;
pub use recorder::{BetRecorder, NewBet};
pub use resolver::{IdentifierResolver, ResolveReport};
pub use scanner::{ScanReport, SettlementScanner};
pub use scheduler::{SettlementScheduler, SingleFlight};
