use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    BoostPlan, BoostPurchase, CreditBalance, CreditTransaction, EntityType, BOOST_PLANS,
    MAX_GRANT_CREDITS,
};
use crate::services::store::{BoostCommit, CommitOutcome, LedgerStore, StoreError};

/// Errors returned by ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient credits: balance {balance}, required {required}")]
    InsufficientCredits { balance: i64, required: i64 },

    #[error("Already boosted: {entity_type} {entity_id} until {ends_at}")]
    AlreadyBoosted {
        entity_type: EntityType,
        entity_id: String,
        ends_at: DateTime<Utc>,
    },

    #[error("No boost plan lasts {0} days")]
    UnknownPlan(u32),

    #[error("Credit amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LedgerError {
    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InsufficientCredits { .. } => "insufficient_credits",
            LedgerError::AlreadyBoosted { .. } => "already_boosted",
            LedgerError::UnknownPlan(_) => "unknown_plan",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::Storage(_) => "storage_error",
        }
    }

    /// Business-rule rejection, as opposed to a storage failure
    pub fn is_rejection(&self) -> bool {
        !matches!(self, LedgerError::Storage(_))
    }
}

/// A completed boost purchase with the ledger entry it produced
#[derive(Debug, Clone)]
pub struct BoostReceipt {
    pub purchase: BoostPurchase,
    pub transaction: CreditTransaction,
}

/// Credit-funded boost workflow
///
/// State per entity: Unboosted -> Boosted(expires_at) -> Unboosted, the last
/// step happening on expiry or an explicit end. A purchase is only valid
/// from Unboosted.
#[derive(Clone)]
pub struct BoostLedger {
    store: Arc<dyn LedgerStore>,
}

impl BoostLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// The fixed plan catalog
    pub fn plans() -> &'static [BoostPlan] {
        &BOOST_PLANS
    }

    pub fn plan_for(duration_days: u32) -> Result<BoostPlan, LedgerError> {
        BoostPlan::for_duration(duration_days).ok_or(LedgerError::UnknownPlan(duration_days))
    }

    pub async fn purchase_boost(
        &self,
        user_id: &str,
        entity_type: EntityType,
        entity_id: &str,
        plan: BoostPlan,
    ) -> Result<BoostReceipt, LedgerError> {
        self.purchase_boost_at(user_id, entity_type, entity_id, plan, Utc::now())
            .await
    }

    /// Buy `plan` for an entity, starting at `now`
    ///
    /// Rejections are checked in order: already boosted, then insufficient
    /// credits. The store re-validates both while writing, so a concurrent
    /// purchase that slips in between the check and the write is still
    /// rejected and nothing is written.
    pub async fn purchase_boost_at(
        &self,
        user_id: &str,
        entity_type: EntityType,
        entity_id: &str,
        plan: BoostPlan,
        now: DateTime<Utc>,
    ) -> Result<BoostReceipt, LedgerError> {
        if let Some(active) = self.store.get_active_boost(entity_type, entity_id, now).await? {
            tracing::warn!(
                "Rejecting boost for {} {}: already boosted until {}",
                entity_type,
                entity_id,
                active.end_at
            );
            return Err(LedgerError::AlreadyBoosted {
                entity_type,
                entity_id: entity_id.to_string(),
                ends_at: active.end_at,
            });
        }

        let balance = self.store.get_credit_balance(user_id).await?;
        if balance.balance < plan.credits_cost {
            tracing::warn!(
                "Rejecting boost for {} {}: user {} has {} credits, needs {}",
                entity_type,
                entity_id,
                user_id,
                balance.balance,
                plan.credits_cost
            );
            return Err(LedgerError::InsufficientCredits {
                balance: balance.balance,
                required: plan.credits_cost,
            });
        }

        let commit = BoostCommit {
            user_id: user_id.to_string(),
            entity_type,
            entity_id: entity_id.to_string(),
            credits_cost: plan.credits_cost,
            boost_score: plan.boost_score(),
            start_at: now,
            end_at: now + plan.duration(),
            purchase_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            description: format!(
                "Boost {} {} for {} days",
                entity_type, entity_id, plan.duration_days
            ),
        };

        match self.store.commit_boost(commit).await? {
            CommitOutcome::Committed { purchase, transaction } => {
                tracing::info!(
                    "User {} boosted {} {} for {} days ({} credits, balance now {})",
                    user_id,
                    entity_type,
                    entity_id,
                    plan.duration_days,
                    plan.credits_cost,
                    transaction.balance_after
                );
                Ok(BoostReceipt { purchase, transaction })
            }
            CommitOutcome::AlreadyBoosted { ends_at } => {
                tracing::warn!("Boost for {} {} lost a race with another purchase", entity_type, entity_id);
                Err(LedgerError::AlreadyBoosted {
                    entity_type,
                    entity_id: entity_id.to_string(),
                    ends_at,
                })
            }
            CommitOutcome::InsufficientCredits { balance } => {
                tracing::warn!("Boost for user {} failed balance re-check ({} credits)", user_id, balance);
                Err(LedgerError::InsufficientCredits {
                    balance,
                    required: plan.credits_cost,
                })
            }
        }
    }

    /// End the current boost of an entity before it expires
    ///
    /// Returns false when the entity was not boosted. Credits are not refunded.
    pub async fn end_boost(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<bool, LedgerError> {
        let Some(active) = self.store.get_active_boost(entity_type, entity_id, Utc::now()).await? else {
            return Ok(false);
        };

        let ended = self.store.end_boost(&active).await?;
        if ended {
            tracing::info!("Ended boost {} on {} {}", active.id, entity_type, entity_id);
        }
        Ok(ended)
    }

    /// Close every boost whose end time has passed
    pub async fn expire_boosts(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let expired = self.store.list_expired_boosts(now).await?;

        let mut ended = 0;
        for purchase in &expired {
            if self.store.end_boost(purchase).await? {
                ended += 1;
            }
        }

        if ended > 0 {
            tracing::info!("Expired {} boosts", ended);
        }
        Ok(ended)
    }

    pub async fn active_boost(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BoostPurchase>, LedgerError> {
        Ok(self.store.get_active_boost(entity_type, entity_id, now).await?)
    }

    /// Add credits to a user's balance
    pub async fn grant_credits(
        &self,
        user_id: &str,
        amount: i64,
        description: &str,
    ) -> Result<CreditTransaction, LedgerError> {
        if amount <= 0 || amount > MAX_GRANT_CREDITS {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let transaction = match self
            .store
            .commit_credit_grant(user_id, amount, description, Utc::now())
            .await
        {
            Ok(transaction) => transaction,
            Err(StoreError::BalanceOverflow { .. }) => {
                tracing::warn!("Rejecting grant of {} credits to {}: balance would overflow", amount, user_id);
                return Err(LedgerError::InvalidAmount(amount));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "Granted {} credits to {} (balance now {})",
            amount,
            user_id,
            transaction.balance_after
        );
        Ok(transaction)
    }

    pub async fn balance(&self, user_id: &str) -> Result<CreditBalance, LedgerError> {
        Ok(self.store.get_credit_balance(user_id).await?)
    }

    pub async fn transactions(&self, user_id: &str) -> Result<Vec<CreditTransaction>, LedgerError> {
        Ok(self.store.list_credit_transactions(user_id).await?)
    }
}
