//! The bet record owned by the ledger and its lifecycle enums.
//!
//! Every enum maps to a lowercase text form (`as_str` / `FromStr`) that the
//! PostgreSQL ledger stores verbatim and the CLI accepts as input.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ParseEnumError;

// =============================================================================
// Direction
// =============================================================================

/// The user's price-movement prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            _ => Err(ParseEnumError::new("direction", s)),
        }
    }
}

// =============================================================================
// Holding Period
// =============================================================================

/// Fixed option durations offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HoldingPeriod {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl HoldingPeriod {
    /// All periods, shortest first.
    pub const ALL: [Self; 7] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::FourHours,
        Self::OneDay,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::OneDay => "1d",
        }
    }

    /// Length of the period in seconds.
    #[must_use]
    pub const fn seconds(&self) -> i64 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinutes => 5 * 60,
            Self::FifteenMinutes => 15 * 60,
            Self::ThirtyMinutes => 30 * 60,
            Self::OneHour => 60 * 60,
            Self::FourHours => 4 * 60 * 60,
            Self::OneDay => 24 * 60 * 60,
        }
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds())
    }
}

impl fmt::Display for HoldingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HoldingPeriod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError::new("holding period", s))
    }
}

// =============================================================================
// Status / Result
// =============================================================================

/// Coarse lifecycle state shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Active,
    Won,
    Lost,
    /// Push (stake refunded) or a creation that never landed on-chain.
    Expired,
}

impl BetStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Expired => "expired",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            "expired" => Ok(Self::Expired),
            _ => Err(ParseEnumError::new("bet status", s)),
        }
    }
}

/// Finer-grained outcome classification, `None` while a bet is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetResult {
    Win,
    Loss,
    Draw,
    /// The on-chain identifier does not point at any option.
    Invalid,
    /// Settlement submission was rejected; needs manual follow-up.
    Error,
}

impl BetResult {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
            Self::Draw => "draw",
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }

    /// Results a given terminal status may carry.
    #[must_use]
    pub fn allowed_for(status: BetStatus) -> &'static [Self] {
        match status {
            BetStatus::Active => &[],
            BetStatus::Won => &[Self::Win],
            BetStatus::Lost => &[Self::Loss, Self::Invalid, Self::Error],
            BetStatus::Expired => &[Self::Draw, Self::Loss],
        }
    }
}

impl fmt::Display for BetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetResult {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "win" => Ok(Self::Win),
            "loss" => Ok(Self::Loss),
            "draw" => Ok(Self::Draw),
            "invalid" => Ok(Self::Invalid),
            "error" => Ok(Self::Error),
            _ => Err(ParseEnumError::new("bet result", s)),
        }
    }
}

// =============================================================================
// On-chain reference
// =============================================================================

/// Integer identifier the option contract assigns at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct OptionId(u128);

impl OptionId {
    #[must_use]
    pub const fn new(id: u128) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OptionId {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Self)
            .map_err(|_| ParseEnumError::new("option id", s))
    }
}

impl From<u128> for OptionId {
    fn from(id: u128) -> Self {
        Self(id)
    }
}

impl From<OptionId> for String {
    fn from(id: OptionId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for OptionId {
    type Error = ParseEnumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Where a bet lives on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainRef {
    /// Hash of the creating transaction; unique across bets.
    pub transaction_hash: String,
    /// Unknown until the creating transaction confirms.
    pub option_id: Option<OptionId>,
    pub block_number: Option<i64>,
}

impl OnChainRef {
    #[must_use]
    pub fn pending(transaction_hash: impl Into<String>) -> Self {
        Self {
            transaction_hash: transaction_hash.into(),
            option_id: None,
            block_number: None,
        }
    }
}

// =============================================================================
// Bet
// =============================================================================

/// A single binary-option bet as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    pub asset: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub holding_period: HoldingPeriod,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub payout: Option<Decimal>,
    pub status: BetStatus,
    pub result: Option<BetResult>,
    pub on_chain: OnChainRef,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Bet {
    /// Builds a fresh ACTIVE bet; `expires_at` is derived from the period.
    ///
    /// `created_at` is truncated to microseconds, the precision PostgreSQL
    /// stores, so a stored bet compares equal to the value that was saved.
    #[must_use]
    pub fn new_active(
        asset: impl Into<String>,
        direction: Direction,
        stake: Decimal,
        holding_period: HoldingPeriod,
        entry_price: Decimal,
        on_chain: OnChainRef,
        created_at: DateTime<Utc>,
    ) -> Self {
        let created_at = created_at.trunc_subsecs(6);
        Self {
            id: Uuid::new_v4(),
            asset: asset.into(),
            direction,
            stake,
            holding_period,
            entry_price,
            exit_price: None,
            payout: None,
            status: BetStatus::Active,
            result: None,
            on_chain,
            created_at,
            expires_at: created_at + holding_period.duration(),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == BetStatus::Active
    }

    /// True once the holding period has elapsed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    #[must_use]
    pub fn option_id(&self) -> Option<OptionId> {
        self.on_chain.option_id
    }

    #[must_use]
    pub fn transaction_hash(&self) -> &str {
        &self.on_chain.transaction_hash
    }

    /// Moves the bet into a terminal state.
    ///
    /// Validity of the combination is checked by the ledger on save, not here.
    pub fn finalize(&mut self, outcome: Settlement) {
        self.status = outcome.status;
        self.result = Some(outcome.result);
        self.exit_price = outcome.exit_price;
        self.payout = Some(outcome.payout);
    }

    /// The terminal fields as a [`Settlement`], if the bet is terminal.
    #[must_use]
    pub fn settlement(&self) -> Option<Settlement> {
        if !self.status.is_terminal() {
            return None;
        }
        Some(Settlement {
            status: self.status,
            result: self.result?,
            exit_price: self.exit_price,
            payout: self.payout?,
        })
    }
}

/// The terminal fields written when a bet leaves ACTIVE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub status: BetStatus,
    pub result: BetResult,
    pub exit_price: Option<Decimal>,
    pub payout: Decimal,
}

impl Settlement {
    /// The option id never pointed at an on-chain option.
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            status: BetStatus::Lost,
            result: BetResult::Invalid,
            exit_price: None,
            payout: Decimal::ZERO,
        }
    }

    /// Settlement submission was rejected on-chain.
    #[must_use]
    pub const fn submission_error() -> Self {
        Self {
            status: BetStatus::Lost,
            result: BetResult::Error,
            exit_price: None,
            payout: Decimal::ZERO,
        }
    }

    /// The creating transaction failed (or was abandoned), so no stake was
    /// ever placed on-chain.
    #[must_use]
    pub const fn never_placed() -> Self {
        Self {
            status: BetStatus::Expired,
            result: BetResult::Loss,
            exit_price: None,
            payout: Decimal::ZERO,
        }
    }

    /// True when the outcome came from an executed on-chain option, which is
    /// exactly when an exit price must be present.
    #[must_use]
    pub fn derived_from_chain(&self) -> bool {
        matches!(
            (self.status, self.result),
            (BetStatus::Won, BetResult::Win)
                | (BetStatus::Expired, BetResult::Draw)
                | (BetStatus::Lost, BetResult::Loss)
        )
    }
}
