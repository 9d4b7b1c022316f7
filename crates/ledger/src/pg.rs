//! PostgreSQL bet ledger.
//!
//! `save` reads the current row with `SELECT ... FOR UPDATE` and validates
//! the transition inside the same transaction, so concurrent writers for one
//! bet serialize on the row lock.

use async_trait::async_trait;
use binopt_core::{
    validate_transition, Bet, BetLedger, DatabaseConfig, InvariantViolation, LedgerError,
    OnChainRef,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

const BET_COLUMNS: &str = "id, asset, direction, stake, holding_period, entry_price, exit_price, \
     payout, status, result, transaction_hash, option_id, block_number, created_at, expires_at";

/// Row shape of the `bets` table.
#[derive(Debug, Clone, FromRow)]
struct BetRow {
    id: Uuid,
    asset: String,
    direction: String,
    stake: Decimal,
    holding_period: String,
    entry_price: Decimal,
    exit_price: Option<Decimal>,
    payout: Option<Decimal>,
    status: String,
    result: Option<String>,
    transaction_hash: String,
    option_id: Option<String>,
    block_number: Option<i64>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<BetRow> for Bet {
    type Error = LedgerError;

    fn try_from(row: BetRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| LedgerError::CorruptRow {
            bet_id: row.id,
            reason,
        };

        Ok(Bet {
            id: row.id,
            direction: row.direction.parse().map_err(|e| corrupt(format!("{e}")))?,
            holding_period: row.holding_period.parse().map_err(|e| corrupt(format!("{e}")))?,
            status: row.status.parse().map_err(|e| corrupt(format!("{e}")))?,
            result: row
                .result
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(|e| corrupt(format!("{e}")))?,
            on_chain: OnChainRef {
                option_id: row
                    .option_id
                    .as_deref()
                    .map(str::parse)
                    .transpose()
                    .map_err(|e| corrupt(format!("{e}")))?,
                transaction_hash: row.transaction_hash.clone(),
                block_number: row.block_number,
            },
            asset: row.asset.clone(),
            stake: row.stake,
            entry_price: row.entry_price,
            exit_price: row.exit_price,
            payout: row.payout,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

fn db_err(err: sqlx::Error) -> LedgerError {
    LedgerError::database(err)
}

fn to_bets(rows: Vec<BetRow>) -> Result<Vec<Bet>, LedgerError> {
    rows.into_iter().map(Bet::try_from).collect()
}

/// Repository for the `bets` table.
#[derive(Debug, Clone)]
pub struct PgBetLedger {
    pool: PgPool,
}

impl PgBetLedger {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(db_err)?;
        Ok(Self::new(pool))
    }

    /// Applies embedded migrations.
    ///
    /// # Errors
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::database(format!("migration failed: {e}")))?;
        info!("Ledger migrations applied");
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        bet: &Bet,
    ) -> Result<(), LedgerError> {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM bets WHERE transaction_hash = $1")
                .bind(bet.transaction_hash())
                .fetch_optional(&mut **tx)
                .await
                .map_err(db_err)?;
        if let Some((existing,)) = existing {
            return Err(duplicate(bet, existing));
        }

        sqlx::query(
            r"
            INSERT INTO bets
                (id, asset, direction, stake, holding_period, entry_price, exit_price, payout,
                 status, result, transaction_hash, option_id, block_number, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ",
        )
        .bind(bet.id)
        .bind(&bet.asset)
        .bind(bet.direction.as_str())
        .bind(bet.stake)
        .bind(bet.holding_period.as_str())
        .bind(bet.entry_price)
        .bind(bet.exit_price)
        .bind(bet.payout)
        .bind(bet.status.as_str())
        .bind(bet.result.map(|r| r.as_str()))
        .bind(bet.transaction_hash())
        .bind(bet.option_id().map(|id| id.to_string()))
        .bind(bet.on_chain.block_number)
        .bind(bet.created_at)
        .bind(bet.expires_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| match &e {
            // Lost a race against a concurrent insert of the same hash.
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                duplicate(bet, Uuid::nil())
            }
            _ => db_err(e),
        })?;

        Ok(())
    }

    async fn update(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        bet: &Bet,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            r"
            UPDATE bets
            SET exit_price = $2, payout = $3, status = $4, result = $5,
                option_id = $6, block_number = $7, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(bet.id)
        .bind(bet.exit_price)
        .bind(bet.payout)
        .bind(bet.status.as_str())
        .bind(bet.result.map(|r| r.as_str()))
        .bind(bet.option_id().map(|id| id.to_string()))
        .bind(bet.on_chain.block_number)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

fn duplicate(bet: &Bet, existing: Uuid) -> LedgerError {
    InvariantViolation::DuplicateTransactionHash {
        tx_hash: bet.transaction_hash().to_string(),
        existing,
    }
    .into()
}

#[async_trait]
impl BetLedger for PgBetLedger {
    async fn find_active_and_expired(&self, now: DateTime<Utc>) -> Result<Vec<Bet>, LedgerError> {
        let rows = sqlx::query_as::<_, BetRow>(&format!(
            "SELECT {BET_COLUMNS} FROM bets
             WHERE status = 'active' AND expires_at <= $1
             ORDER BY expires_at ASC, created_at ASC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        to_bets(rows)
    }

    async fn find_active_without_option_id(&self) -> Result<Vec<Bet>, LedgerError> {
        let rows = sqlx::query_as::<_, BetRow>(&format!(
            "SELECT {BET_COLUMNS} FROM bets
             WHERE status = 'active' AND option_id IS NULL
             ORDER BY expires_at ASC, created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        to_bets(rows)
    }

    async fn find_by_transaction_hash(&self, tx_hash: &str) -> Result<Option<Bet>, LedgerError> {
        let row = sqlx::query_as::<_, BetRow>(&format!(
            "SELECT {BET_COLUMNS} FROM bets WHERE transaction_hash = $1"
        ))
        .bind(tx_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Bet::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Bet>, LedgerError> {
        let row = sqlx::query_as::<_, BetRow>(&format!("SELECT {BET_COLUMNS} FROM bets WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(Bet::try_from).transpose()
    }

    async fn save(&self, bet: &Bet) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let previous = sqlx::query_as::<_, BetRow>(&format!(
            "SELECT {BET_COLUMNS} FROM bets WHERE id = $1 FOR UPDATE"
        ))
        .bind(bet.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .map(Bet::try_from)
        .transpose()?;

        validate_transition(previous.as_ref(), bet)?;

        match previous {
            None => self.insert(&mut tx, bet).await?,
            Some(prev) if prev == *bet => {
                debug!(bet_id = %bet.id, "Save is a no-op, row unchanged");
            }
            Some(_) => self.update(&mut tx, bet).await?,
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
