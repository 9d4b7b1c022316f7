//! Lifecycle invariants every ledger write must satisfy.
//!
//! Ledger implementations call [`validate_transition`] with the currently
//! stored row (if any) and the row about to be written. The check is pure so
//! the PostgreSQL and in-memory ledgers enforce exactly the same rules.

use rust_decimal::Decimal;

use crate::bet::{Bet, BetResult, BetStatus, Settlement};
use crate::error::InvariantViolation;

/// Validates writing `next` over `previous` (`None` for an insert).
///
/// # Errors
/// Returns the first violated invariant.
pub fn validate_transition(previous: Option<&Bet>, next: &Bet) -> Result<(), InvariantViolation> {
    match previous {
        None => validate_insert(next),
        Some(prev) => validate_update(prev, next),
    }
}

fn validate_insert(bet: &Bet) -> Result<(), InvariantViolation> {
    if bet.status != BetStatus::Active {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            format!("new bets must be active, got {}", bet.status),
        ));
    }
    if bet.stake <= Decimal::ZERO {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            format!("stake must be positive, got {}", bet.stake),
        ));
    }
    if bet.entry_price <= Decimal::ZERO {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            format!("entry price must be positive, got {}", bet.entry_price),
        ));
    }
    if bet.on_chain.transaction_hash.trim().is_empty() {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            "transaction hash is required at creation",
        ));
    }
    if bet.expires_at != bet.created_at + bet.holding_period.duration() {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            "expires_at must equal created_at + holding period",
        ));
    }
    validate_shape(bet)
}

fn validate_update(prev: &Bet, next: &Bet) -> Result<(), InvariantViolation> {
    check_immutable(prev, next)?;

    if let Some(existing) = prev.on_chain.option_id {
        if next.on_chain.option_id != Some(existing) {
            return Err(InvariantViolation::OptionIdRewrite {
                bet_id: prev.id,
                existing,
                attempted: next.on_chain.option_id,
            });
        }
    }

    if prev.status.is_terminal() {
        if next.status == BetStatus::Active {
            return Err(InvariantViolation::BackwardTransition {
                bet_id: prev.id,
                from: prev.status.as_str(),
                to: next.status.as_str(),
            });
        }
        // Re-stating the identical terminal outcome is an idempotent no-op.
        if prev.settlement() != next.settlement() {
            return Err(InvariantViolation::TerminalRewrite { bet_id: prev.id });
        }
    }

    validate_shape(next)
}

fn check_immutable(prev: &Bet, next: &Bet) -> Result<(), InvariantViolation> {
    let changed = |field: &'static str| InvariantViolation::ImmutableField {
        bet_id: prev.id,
        field,
    };

    if prev.id != next.id {
        return Err(changed("id"));
    }
    if prev.entry_price != next.entry_price {
        return Err(changed("entry_price"));
    }
    if prev.asset != next.asset {
        return Err(changed("asset"));
    }
    if prev.direction != next.direction {
        return Err(changed("direction"));
    }
    if prev.stake != next.stake {
        return Err(changed("stake"));
    }
    if prev.holding_period != next.holding_period {
        return Err(changed("holding_period"));
    }
    if prev.on_chain.transaction_hash != next.on_chain.transaction_hash {
        return Err(changed("transaction_hash"));
    }
    if prev.created_at != next.created_at {
        return Err(changed("created_at"));
    }
    if prev.expires_at != next.expires_at {
        return Err(changed("expires_at"));
    }
    Ok(())
}

/// Field combinations that must hold for any single row.
fn validate_shape(bet: &Bet) -> Result<(), InvariantViolation> {
    if bet.status == BetStatus::Active {
        if bet.result.is_some() || bet.exit_price.is_some() || bet.payout.is_some() {
            return Err(InvariantViolation::inconsistent(
                bet.id,
                "active bets carry no result, exit price or payout",
            ));
        }
        return Ok(());
    }

    let Some(result) = bet.result else {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            format!("{} bet without a result", bet.status),
        ));
    };
    if !BetResult::allowed_for(bet.status).contains(&result) {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            format!("result {result} is not valid for status {}", bet.status),
        ));
    }

    let Some(payout) = bet.payout else {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            "terminal bets must carry a payout",
        ));
    };
    if payout < Decimal::ZERO {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            format!("payout must not be negative, got {payout}"),
        ));
    }

    let settlement = Settlement {
        status: bet.status,
        result,
        exit_price: bet.exit_price,
        payout,
    };
    if settlement.derived_from_chain() && bet.exit_price.is_none() {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            "settled outcomes must carry an exit price",
        ));
    }
    if result == BetResult::Draw && payout != bet.stake {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            "a push refunds exactly the stake",
        ));
    }
    if matches!(result, BetResult::Loss | BetResult::Invalid | BetResult::Error)
        && payout != Decimal::ZERO
    {
        return Err(InvariantViolation::inconsistent(
            bet.id,
            format!("{result} outcomes pay nothing"),
        ));
    }

    Ok(())
}
