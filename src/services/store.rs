//! Storage contracts used by the listing search and the boost ledger.
//!
//! Listing documents and the credit ledger can live in different backends,
//! so they are separate traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    BoostPurchase, CreditBalance, CreditTransaction, EntityBoostState, EntityType, ListableEntity,
};
use crate::services::appwrite::AppwriteError;

/// Failure of the underlying store itself
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Appwrite error: {0}")]
    AppwriteError(#[from] AppwriteError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Crediting {amount} to {user_id} would overflow the balance")]
    BalanceOverflow { user_id: String, amount: i64 },
}

/// Everything written by a successful boost purchase
#[derive(Debug, Clone)]
pub struct BoostCommit {
    pub user_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub credits_cost: i64,
    pub boost_score: u32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub purchase_id: Uuid,
    pub transaction_id: Uuid,
    pub description: String,
}

impl BoostCommit {
    pub fn purchase(&self) -> BoostPurchase {
        BoostPurchase {
            id: self.purchase_id,
            user_id: self.user_id.clone(),
            entity_type: self.entity_type,
            entity_id: self.entity_id.clone(),
            credits_spent: self.credits_cost,
            start_at: self.start_at,
            end_at: self.end_at,
            is_active: true,
        }
    }

    pub fn transaction(&self, balance_after: i64) -> CreditTransaction {
        CreditTransaction {
            id: self.transaction_id,
            user_id: self.user_id.clone(),
            amount: -self.credits_cost,
            balance_after,
            description: self.description.clone(),
            created_at: self.start_at,
        }
    }

    pub fn boost_state(&self) -> EntityBoostState {
        EntityBoostState {
            entity_type: self.entity_type,
            entity_id: self.entity_id.clone(),
            is_boosted: true,
            boost_score: self.boost_score,
            boost_expires_at: Some(self.end_at),
        }
    }
}

/// Result of the write-time re-validation inside [`LedgerStore::commit_boost`]
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Committed {
        purchase: BoostPurchase,
        transaction: CreditTransaction,
    },
    AlreadyBoosted {
        ends_at: DateTime<Utc>,
    },
    InsufficientCredits {
        balance: i64,
    },
}

/// Source of listing documents
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn list_entities(
        &self,
        entity_type: EntityType,
        active_only: bool,
    ) -> Result<Vec<ListableEntity>, StoreError>;
}

/// Credit balances, the transaction ledger and boost records
///
/// Every method that writes more than one record must apply all of it or
/// none of it.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Balance for a user; users without a row hold zero credits
    async fn get_credit_balance(&self, user_id: &str) -> Result<CreditBalance, StoreError>;

    /// Purchase that is active and unexpired at `now`
    async fn get_active_boost(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BoostPurchase>, StoreError>;

    /// Ledger entries for a user, newest first
    async fn list_credit_transactions(
        &self,
        user_id: &str,
    ) -> Result<Vec<CreditTransaction>, StoreError>;

    /// Boost fields of every entity of a type that has ever been boosted
    async fn list_boost_states(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<EntityBoostState>, StoreError>;

    /// Atomically debit, append the transaction, record the purchase and
    /// flag the entity
    ///
    /// Re-checks at write time that no current boost exists for the entity
    /// and that the balance covers the cost; either failing leaves every
    /// record untouched and is reported through [`CommitOutcome`].
    async fn commit_boost(&self, commit: BoostCommit) -> Result<CommitOutcome, StoreError>;

    /// Atomically add `amount` to the balance and append the transaction
    async fn commit_credit_grant(
        &self,
        user_id: &str,
        amount: i64,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<CreditTransaction, StoreError>;

    /// Deactivate a purchase and clear the entity's boost fields
    ///
    /// Returns false when the purchase was not active.
    async fn end_boost(&self, purchase: &BoostPurchase) -> Result<bool, StoreError>;

    /// Purchases still flagged active whose end time is before `now`
    async fn list_expired_boosts(&self, now: DateTime<Utc>) -> Result<Vec<BoostPurchase>, StoreError>;
}
