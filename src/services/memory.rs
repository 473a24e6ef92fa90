use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    BoostPurchase, CreditBalance, CreditTransaction, EntityBoostState, EntityType, ListableEntity,
};
use crate::services::store::{BoostCommit, CommitOutcome, LedgerStore, ListingSource, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    entities: Vec<ListableEntity>,
    balances: HashMap<String, i64>,
    transactions: Vec<CreditTransaction>,
    purchases: Vec<BoostPurchase>,
    boost_states: HashMap<(EntityType, String), EntityBoostState>,
}

impl MemoryState {
    fn current_boost(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        now: DateTime<Utc>,
    ) -> Option<&BoostPurchase> {
        self.purchases.iter().find(|p| {
            p.entity_type == entity_type && p.entity_id == entity_id && p.is_current(now)
        })
    }

    fn write_boost_state(&mut self, state: EntityBoostState) {
        for entity in self
            .entities
            .iter_mut()
            .filter(|e| e.entity_type == state.entity_type && e.id == state.entity_id)
        {
            entity.apply_boost_state(&state);
        }
        self.boost_states
            .insert((state.entity_type, state.entity_id.clone()), state);
    }
}

/// In-process store for listings and the credit ledger
///
/// Every operation runs under a single lock, so multi-record writes are
/// atomic and concurrent purchases are serialized.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the listing collection
    pub fn with_entities(entities: Vec<ListableEntity>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                entities,
                ..MemoryState::default()
            }),
        }
    }

    pub async fn insert_entity(&self, entity: ListableEntity) {
        self.state.lock().await.entities.push(entity);
    }

    /// Overwrite a balance without touching the ledger (fixtures only)
    pub async fn set_balance(&self, user_id: &str, balance: i64) {
        self.state
            .lock()
            .await
            .balances
            .insert(user_id.to_string(), balance);
    }

    pub async fn purchases(&self) -> Vec<BoostPurchase> {
        self.state.lock().await.purchases.clone()
    }
}

#[async_trait]
impl ListingSource for MemoryStore {
    async fn list_entities(
        &self,
        entity_type: EntityType,
        active_only: bool,
    ) -> Result<Vec<ListableEntity>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .entities
            .iter()
            .filter(|e| e.entity_type == entity_type && (!active_only || e.is_active))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_credit_balance(&self, user_id: &str) -> Result<CreditBalance, StoreError> {
        let state = self.state.lock().await;
        Ok(CreditBalance {
            user_id: user_id.to_string(),
            balance: state.balances.get(user_id).copied().unwrap_or(0),
        })
    }

    async fn get_active_boost(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BoostPurchase>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.current_boost(entity_type, entity_id, now).cloned())
    }

    async fn list_credit_transactions(
        &self,
        user_id: &str,
    ) -> Result<Vec<CreditTransaction>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_boost_states(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<EntityBoostState>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .boost_states
            .values()
            .filter(|s| s.entity_type == entity_type)
            .cloned()
            .collect())
    }

    async fn commit_boost(&self, commit: BoostCommit) -> Result<CommitOutcome, StoreError> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.current_boost(commit.entity_type, &commit.entity_id, commit.start_at) {
            return Ok(CommitOutcome::AlreadyBoosted { ends_at: existing.end_at });
        }

        let balance = state.balances.get(&commit.user_id).copied().unwrap_or(0);
        if balance < commit.credits_cost {
            return Ok(CommitOutcome::InsufficientCredits { balance });
        }

        // Lapsed purchases for this entity stop counting as active
        for stale in state.purchases.iter_mut().filter(|p| {
            p.entity_type == commit.entity_type && p.entity_id == commit.entity_id && p.is_active
        }) {
            stale.is_active = false;
        }

        let balance_after = balance - commit.credits_cost;
        let purchase = commit.purchase();
        let transaction = commit.transaction(balance_after);

        state.balances.insert(commit.user_id.clone(), balance_after);
        state.transactions.push(transaction.clone());
        state.purchases.push(purchase.clone());
        state.write_boost_state(commit.boost_state());

        Ok(CommitOutcome::Committed { purchase, transaction })
    }

    async fn commit_credit_grant(
        &self,
        user_id: &str,
        amount: i64,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<CreditTransaction, StoreError> {
        let mut state = self.state.lock().await;

        let current = state.balances.get(user_id).copied().unwrap_or(0);
        let balance_after = current
            .checked_add(amount)
            .filter(|balance| *balance >= 0)
            .ok_or_else(|| StoreError::BalanceOverflow {
                user_id: user_id.to_string(),
                amount,
            })?;
        state.balances.insert(user_id.to_string(), balance_after);

        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            amount,
            balance_after,
            description: description.to_string(),
            created_at: now,
        };
        state.transactions.push(transaction.clone());

        Ok(transaction)
    }

    async fn end_boost(&self, purchase: &BoostPurchase) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;

        let Some(stored) = state
            .purchases
            .iter_mut()
            .find(|p| p.id == purchase.id && p.is_active)
        else {
            return Ok(false);
        };
        stored.is_active = false;

        state.write_boost_state(EntityBoostState::cleared(
            purchase.entity_type,
            purchase.entity_id.clone(),
        ));

        Ok(true)
    }

    async fn list_expired_boosts(&self, now: DateTime<Utc>) -> Result<Vec<BoostPurchase>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .purchases
            .iter()
            .filter(|p| p.is_active && p.end_at < now)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn commit_for(user_id: &str, entity_id: &str, cost: i64, now: DateTime<Utc>) -> BoostCommit {
        BoostCommit {
            user_id: user_id.to_string(),
            entity_type: EntityType::Product,
            entity_id: entity_id.to_string(),
            credits_cost: cost,
            boost_score: 70,
            start_at: now,
            end_at: now + Duration::days(7),
            purchase_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            description: "test boost".to_string(),
        }
    }

    #[tokio::test]
    async fn test_commit_rejects_without_writing() {
        let store = MemoryStore::new();
        store.set_balance("u1", 50).await;
        let now = Utc::now();

        let outcome = store.commit_boost(commit_for("u1", "p1", 100, now)).await.unwrap();

        assert_eq!(outcome, CommitOutcome::InsufficientCredits { balance: 50 });
        assert_eq!(store.get_credit_balance("u1").await.unwrap().balance, 50);
        assert!(store.list_credit_transactions("u1").await.unwrap().is_empty());
        assert!(store.purchases().await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_replaces_lapsed_boost() {
        let store = MemoryStore::new();
        store.set_balance("u1", 500).await;
        let then = Utc::now() - Duration::days(10);

        let first = store.commit_boost(commit_for("u1", "p1", 100, then)).await.unwrap();
        assert!(matches!(first, CommitOutcome::Committed { .. }));

        let now = Utc::now();
        assert!(store.get_active_boost(EntityType::Product, "p1", now).await.unwrap().is_none());

        let second = store.commit_boost(commit_for("u1", "p1", 100, now)).await.unwrap();
        assert!(matches!(second, CommitOutcome::Committed { .. }));

        let active: Vec<_> = store.purchases().await.into_iter().filter(|p| p.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].start_at, now);
    }

    #[tokio::test]
    async fn test_grant_accumulates() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store.commit_credit_grant("u1", 100, "top-up", now).await.unwrap();
        let tx = store.commit_credit_grant("u1", 50, "top-up", now).await.unwrap();

        assert_eq!(tx.balance_after, 150);
        assert_eq!(store.get_credit_balance("u1").await.unwrap().balance, 150);
        let history = store.list_credit_transactions("u1").await.unwrap();
        assert_eq!(history[0].id, tx.id);
    }

    #[tokio::test]
    async fn test_grant_overflow_writes_nothing() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store.commit_credit_grant("u1", i64::MAX, "top-up", now).await.unwrap();
        let err = store.commit_credit_grant("u1", 1, "top-up", now).await.unwrap_err();

        assert!(matches!(err, StoreError::BalanceOverflow { amount: 1, .. }));
        assert_eq!(store.get_credit_balance("u1").await.unwrap().balance, i64::MAX);
        assert_eq!(store.list_credit_transactions("u1").await.unwrap().len(), 1);
    }
}
