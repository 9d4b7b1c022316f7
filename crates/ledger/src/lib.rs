//! [`BetLedger`](binopt_core::BetLedger) implementations.

pub mod memory;
pub mod pg;

pub use memory::InMemoryBetLedger;
pub use pg::{PgBetLedger, MIGRATOR};

use binopt_core::Bet;

/// Processing order shared by every backend: soonest expiry first.
pub(crate) fn sort_for_processing(bets: &mut [Bet]) {
    bets.sort_by(|a, b| {
        a.expires_at
            .cmp(&b.expires_at)
            .then(a.created_at.cmp(&b.created_at))
    });
}
