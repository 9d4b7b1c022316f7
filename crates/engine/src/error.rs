use binopt_core::{BetStatus, ChainError, LedgerError, OracleError};
use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced by the engine's control loops and actions.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Chain state disagrees with what the step just did.
    #[error("bet {bet_id}: {reason}")]
    Inconsistent { bet_id: Uuid, reason: String },

    #[error("bet {0} not found")]
    BetNotFound(Uuid),

    #[error("bet {bet_id} cannot be force-expired: {reason}")]
    ForceExpireRefused { bet_id: Uuid, reason: String },

    #[error("bet {bet_id} is already {status}")]
    AlreadyTerminal { bet_id: Uuid, status: BetStatus },
}

impl EngineError {
    /// True when the failure is not about the bet in hand and the current
    /// tick should stop.
    #[must_use]
    pub fn is_systemic(&self) -> bool {
        match self {
            Self::Chain(err) => err.is_systemic(),
            Self::Ledger(LedgerError::Database(_)) => true,
            _ => false,
        }
    }
}
