//! PostgreSQL ledger round trips. Run with a scratch database:
//! `DATABASE_URL=postgres://... cargo test -p binopt-ledger -- --ignored`

use binopt_core::{
    Bet, BetLedger, BetResult, BetStatus, DatabaseConfig, Direction, HoldingPeriod,
    InvariantViolation, LedgerError, OnChainRef, OptionId, Settlement,
};
use binopt_ledger::PgBetLedger;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn ledger() -> PgBetLedger {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let ledger = PgBetLedger::connect(&DatabaseConfig {
        url,
        max_connections: 4,
    })
    .await
    .unwrap();
    ledger.migrate().await.unwrap();
    ledger
}

fn fresh_bet() -> Bet {
    Bet::new_active(
        "BTC",
        Direction::Up,
        dec!(12.5),
        HoldingPeriod::OneMinute,
        dec!(64000.12345678),
        OnChainRef::pending(format!("0x{}", Uuid::new_v4().simple())),
        Utc::now() - Duration::minutes(5),
    )
}

#[tokio::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn test_insert_resolve_settle_round_trip() {
    let ledger = ledger().await;
    let mut bet = fresh_bet();
    ledger.save(&bet).await.unwrap();

    let stored = ledger.find_by_id(bet.id).await.unwrap().unwrap();
    assert_eq!(stored, bet);
    assert!(ledger
        .find_active_without_option_id()
        .await
        .unwrap()
        .iter()
        .any(|b| b.id == bet.id));

    bet.on_chain.option_id = Some(OptionId::new(u128::from(u64::MAX) + 1));
    bet.on_chain.block_number = Some(123);
    ledger.save(&bet).await.unwrap();
    assert!(ledger
        .find_active_and_expired(Utc::now())
        .await
        .unwrap()
        .iter()
        .any(|b| b.id == bet.id && b.option_id() == bet.option_id()));

    bet.finalize(Settlement {
        status: BetStatus::Won,
        result: BetResult::Win,
        exit_price: Some(dec!(64100)),
        payout: dec!(23.75),
    });
    ledger.save(&bet).await.unwrap();
    // Re-stating the same outcome is accepted.
    ledger.save(&bet).await.unwrap();

    let stored = ledger
        .find_by_transaction_hash(bet.transaction_hash())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, BetStatus::Won);
    assert_eq!(stored.payout, Some(dec!(23.75)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL via DATABASE_URL"]
async fn test_rejects_terminal_rewrite_and_duplicate_hash() {
    let ledger = ledger().await;
    let mut bet = fresh_bet();
    ledger.save(&bet).await.unwrap();

    let mut twin = fresh_bet();
    twin.on_chain.transaction_hash = bet.transaction_hash().to_string();
    let err = ledger.save(&twin).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Invariant(InvariantViolation::DuplicateTransactionHash { .. })
    ));

    bet.finalize(Settlement::never_placed());
    ledger.save(&bet).await.unwrap();

    let mut rewrite = bet.clone();
    rewrite.finalize(Settlement::invalid());
    assert!(ledger.save(&rewrite).await.unwrap_err().is_invariant_violation());
}
