use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    BoostPurchase, CreditBalance, CreditTransaction, EntityBoostState, EntityType,
};
use crate::services::store::{BoostCommit, CommitOutcome, LedgerStore, StoreError};

/// PostgreSQL-backed credit ledger
///
/// Balances, the transaction log, boost purchases and per-entity boost
/// fields live here so a purchase can be written in one transaction. The
/// listing documents themselves stay in Appwrite; their boost fields are
/// overlaid from `entity_boost_states` at read time.
pub struct PostgresClient {
    pool: PgPool,
}

fn parse_entity_type(raw: &str) -> Result<EntityType, StoreError> {
    raw.parse::<EntityType>().map_err(StoreError::Corrupt)
}

fn score_to_db(score: u32) -> Result<i32, StoreError> {
    i32::try_from(score).map_err(|_| StoreError::Corrupt(format!("boost score {} out of range", score)))
}

fn score_from_db(score: i32) -> Result<u32, StoreError> {
    u32::try_from(score).map_err(|_| StoreError::Corrupt(format!("negative boost score {}", score)))
}

fn purchase_from_row(row: &PgRow) -> Result<BoostPurchase, StoreError> {
    Ok(BoostPurchase {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        entity_type: parse_entity_type(row.try_get::<&str, _>("entity_type")?)?,
        entity_id: row.try_get("entity_id")?,
        credits_spent: row.try_get("credits_spent")?,
        start_at: row.try_get("start_at")?,
        end_at: row.try_get("end_at")?,
        is_active: row.try_get("is_active")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<CreditTransaction, StoreError> {
    Ok(CreditTransaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: row.try_get("amount")?,
        balance_after: row.try_get("balance_after")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

/// SQLSTATE raised when `balance + amount` leaves the BIGINT range
const NUMERIC_OUT_OF_RANGE: &str = "22003";

const PURCHASE_COLUMNS: &str =
    "id, user_id, entity_type, entity_id, credits_spent, start_at, end_at, is_active";

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }

    async fn write_boost_state(
        tx: &mut Transaction<'_, Postgres>,
        state: &EntityBoostState,
    ) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO entity_boost_states (entity_type, entity_id, is_boosted, boost_score, boost_expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (entity_type, entity_id)
            DO UPDATE SET
                is_boosted = EXCLUDED.is_boosted,
                boost_score = EXCLUDED.boost_score,
                boost_expires_at = EXCLUDED.boost_expires_at
        "#;

        sqlx::query(query)
            .bind(state.entity_type.as_str())
            .bind(&state.entity_id)
            .bind(state.is_boosted)
            .bind(score_to_db(state.boost_score)?)
            .bind(state.boost_expires_at)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn insert_transaction(
        tx: &mut Transaction<'_, Postgres>,
        entry: &CreditTransaction,
    ) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO credit_transactions (id, user_id, amount, balance_after, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#;

        sqlx::query(query)
            .bind(entry.id)
            .bind(&entry.user_id)
            .bind(entry.amount)
            .bind(entry.balance_after)
            .bind(&entry.description)
            .bind(entry.created_at)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresClient {
    async fn get_credit_balance(&self, user_id: &str) -> Result<CreditBalance, StoreError> {
        let row = sqlx::query("SELECT balance FROM credit_balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let balance = match row {
            Some(row) => row.try_get("balance")?,
            None => 0,
        };

        Ok(CreditBalance {
            user_id: user_id.to_string(),
            balance,
        })
    }

    async fn get_active_boost(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BoostPurchase>, StoreError> {
        let query = format!(
            "SELECT {} FROM boost_purchases \
             WHERE entity_type = $1 AND entity_id = $2 AND is_active AND end_at >= $3",
            PURCHASE_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(entity_type.as_str())
            .bind(entity_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn list_credit_transactions(
        &self,
        user_id: &str,
    ) -> Result<Vec<CreditTransaction>, StoreError> {
        let query = r#"
            SELECT id, user_id, amount, balance_after, description, created_at
            FROM credit_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
        "#;

        let rows = sqlx::query(query).bind(user_id).fetch_all(&self.pool).await?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn list_boost_states(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<EntityBoostState>, StoreError> {
        let query = r#"
            SELECT entity_type, entity_id, is_boosted, boost_score, boost_expires_at
            FROM entity_boost_states
            WHERE entity_type = $1
        "#;

        let rows = sqlx::query(query)
            .bind(entity_type.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(EntityBoostState {
                    entity_type: parse_entity_type(row.try_get::<&str, _>("entity_type")?)?,
                    entity_id: row.try_get("entity_id")?,
                    is_boosted: row.try_get("is_boosted")?,
                    boost_score: score_from_db(row.try_get("boost_score")?)?,
                    boost_expires_at: row.try_get("boost_expires_at")?,
                })
            })
            .collect()
    }

    /// One transaction: the conditional debit `balance >= cost` and the
    /// partial unique index on active purchases serialize racing buyers.
    async fn commit_boost(&self, commit: BoostCommit) -> Result<CommitOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let entity_type = commit.entity_type.as_str();

        // Lapsed boosts release the active slot for this entity
        sqlx::query(
            "UPDATE boost_purchases SET is_active = FALSE \
             WHERE entity_type = $1 AND entity_id = $2 AND is_active AND end_at < $3",
        )
        .bind(entity_type)
        .bind(&commit.entity_id)
        .bind(commit.start_at)
        .execute(&mut *tx)
        .await?;

        let existing = sqlx::query(
            "SELECT end_at FROM boost_purchases \
             WHERE entity_type = $1 AND entity_id = $2 AND is_active FOR UPDATE",
        )
        .bind(entity_type)
        .bind(&commit.entity_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            let ends_at: DateTime<Utc> = row.try_get("end_at")?;
            tx.rollback().await?;
            return Ok(CommitOutcome::AlreadyBoosted { ends_at });
        }

        let debited = sqlx::query(
            "UPDATE credit_balances SET balance = balance - $2, updated_at = NOW() \
             WHERE user_id = $1 AND balance >= $2 \
             RETURNING balance",
        )
        .bind(&commit.user_id)
        .bind(commit.credits_cost)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = debited else {
            tx.rollback().await?;
            let balance = self.get_credit_balance(&commit.user_id).await?.balance;
            return Ok(CommitOutcome::InsufficientCredits { balance });
        };
        let balance_after: i64 = row.try_get("balance")?;

        let transaction = commit.transaction(balance_after);
        Self::insert_transaction(&mut tx, &transaction).await?;

        let purchase = commit.purchase();
        let inserted = sqlx::query(&format!(
            "INSERT INTO boost_purchases ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            PURCHASE_COLUMNS
        ))
        .bind(purchase.id)
        .bind(&purchase.user_id)
        .bind(entity_type)
        .bind(&purchase.entity_id)
        .bind(purchase.credits_spent)
        .bind(purchase.start_at)
        .bind(purchase.end_at)
        .bind(purchase.is_active)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            let lost_race = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
            tx.rollback().await?;
            if lost_race {
                let ends_at = self
                    .get_active_boost(commit.entity_type, &commit.entity_id, commit.start_at)
                    .await?
                    .map(|p| p.end_at)
                    .unwrap_or(commit.end_at);
                return Ok(CommitOutcome::AlreadyBoosted { ends_at });
            }
            return Err(e.into());
        }

        Self::write_boost_state(&mut tx, &commit.boost_state()).await?;

        tx.commit().await?;

        tracing::debug!(
            "Committed boost {} for {} {} (balance {})",
            purchase.id,
            entity_type,
            purchase.entity_id,
            balance_after
        );

        Ok(CommitOutcome::Committed { purchase, transaction })
    }

    async fn commit_credit_grant(
        &self,
        user_id: &str,
        amount: i64,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<CreditTransaction, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO credit_balances (user_id, balance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET
                balance = credit_balances.balance + EXCLUDED.balance,
                updated_at = NOW()
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            let overflow = matches!(
                &e,
                sqlx::Error::Database(db) if db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE)
            );
            if overflow {
                StoreError::BalanceOverflow {
                    user_id: user_id.to_string(),
                    amount,
                }
            } else {
                e.into()
            }
        })?;

        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            amount,
            balance_after: row.try_get("balance")?,
            description: description.to_string(),
            created_at: now,
        };
        Self::insert_transaction(&mut tx, &transaction).await?;

        tx.commit().await?;

        Ok(transaction)
    }

    async fn end_boost(&self, purchase: &BoostPurchase) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE boost_purchases SET is_active = FALSE WHERE id = $1 AND is_active")
            .bind(purchase.id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let cleared = EntityBoostState::cleared(purchase.entity_type, purchase.entity_id.clone());
        Self::write_boost_state(&mut tx, &cleared).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_expired_boosts(&self, now: DateTime<Utc>) -> Result<Vec<BoostPurchase>, StoreError> {
        let query = format!(
            "SELECT {} FROM boost_purchases WHERE is_active AND end_at < $1 ORDER BY end_at",
            PURCHASE_COLUMNS
        );

        let rows = sqlx::query(&query).bind(now).fetch_all(&self.pool).await?;

        rows.iter().map(purchase_from_row).collect()
    }
}
