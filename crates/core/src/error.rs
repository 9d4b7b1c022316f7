//! Error taxonomy shared by the chain, ledger and engine crates.
//!
//! Chain errors carry two classifications the engine relies on:
//! [`ChainError::is_rate_limited`] decides what the rate gate retries, and
//! [`ChainError::is_systemic`] decides whether a scanning tick aborts instead
//! of marking the bet in hand as failed.

use thiserror::Error;
use uuid::Uuid;

use crate::bet::OptionId;

/// Text that does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

// =============================================================================
// Ledger invariants
// =============================================================================

/// A write that would break a bet lifecycle invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("bet {bet_id}: immutable field `{field}` changed")]
    ImmutableField { bet_id: Uuid, field: &'static str },

    #[error("bet {bet_id}: option id already set to {existing}, refusing {attempted:?}")]
    OptionIdRewrite {
        bet_id: Uuid,
        existing: OptionId,
        attempted: Option<OptionId>,
    },

    #[error("bet {bet_id}: illegal status transition {from} -> {to}")]
    BackwardTransition {
        bet_id: Uuid,
        from: &'static str,
        to: &'static str,
    },

    #[error("bet {bet_id}: terminal outcome already recorded and cannot change")]
    TerminalRewrite { bet_id: Uuid },

    #[error("bet {bet_id}: inconsistent state: {reason}")]
    InconsistentState { bet_id: Uuid, reason: String },

    #[error("transaction hash {tx_hash} already belongs to bet {existing}")]
    DuplicateTransactionHash { tx_hash: String, existing: Uuid },
}

impl InvariantViolation {
    pub fn inconsistent(bet_id: Uuid, reason: impl Into<String>) -> Self {
        Self::InconsistentState {
            bet_id,
            reason: reason.into(),
        }
    }
}

/// Errors returned by a [`crate::traits::BetLedger`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// `LedgerInvariantViolation`: always rejected, never coerced.
    #[error("ledger invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("bet not found: {0}")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back onto a bet.
    #[error("corrupt row for bet {bet_id}: {reason}")]
    CorruptRow { bet_id: Uuid, reason: String },
}

impl LedgerError {
    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

// =============================================================================
// Chain gateway
// =============================================================================

/// Errors from the chain gateway and its transport.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Upstream throttling that outlasted the retry budget.
    #[error("rate limited by RPC provider after {attempts} attempts: {message}")]
    RateLimited { attempts: u32, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Malformed or empty response data; providers emit these when throttling.
    #[error("bad response data: {0}")]
    BadData(String),

    #[error("option {option_id} not found on-chain")]
    OptionNotFound { option_id: OptionId },

    #[error("option {option_id} already settled on-chain")]
    AlreadySettled { option_id: OptionId },

    #[error("settlement of option {option_id} failed: {reason}")]
    SubmissionFailed { option_id: OptionId, reason: String },

    /// Broadcast succeeded but no receipt arrived within the polling window.
    #[error("no receipt for transaction {tx_hash} within {waited_secs}s")]
    ReceiptTimeout { tx_hash: String, waited_secs: u64 },

    #[error("signing error: {0}")]
    Signing(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// JSON-RPC code several providers use for "limit exceeded".
pub const RPC_LIMIT_EXCEEDED: i64 = -32005;

impl ChainError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    pub fn submission_failed(option_id: OptionId, reason: impl Into<String>) -> Self {
        Self::SubmissionFailed {
            option_id,
            reason: reason.into(),
        }
    }

    /// Returns true for upstream throttling signals the rate gate should retry.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::BadData(_) => true,
            Self::Rpc { code, message } => {
                *code == RPC_LIMIT_EXCEEDED || message_signals_throttling(message)
            }
            Self::Network(message) => message_signals_throttling(message),
            _ => false,
        }
    }

    /// Returns true when the failure says nothing about the bet in hand and
    /// the current tick should stop instead of classifying it.
    #[must_use]
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Network(_)
                | Self::Timeout(_)
                | Self::Rpc { .. }
                | Self::BadData(_)
                | Self::ReceiptTimeout { .. }
                | Self::Configuration(_)
        )
    }
}

fn message_signals_throttling(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("429")
        || lower.contains("limit exceeded")
}

// =============================================================================
// Price oracle
// =============================================================================

/// Errors from the price oracle client.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// `OracleUnavailable`: no usable price for `asset`.
    #[error("price unavailable for {asset}: {reason}")]
    Unavailable { asset: String, reason: String },
}

impl OracleError {
    pub fn unavailable(asset: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            asset: asset.into(),
            reason: reason.to_string(),
        }
    }
}
