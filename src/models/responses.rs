use serde::{Deserialize, Serialize};
use crate::models::domain::{BoostPlan, BoostPurchase, CreditTransaction};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

/// Boost plan catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansResponse {
    pub plans: Vec<BoostPlan>,
}

/// Successful boost purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseBoostResponse {
    pub purchase: BoostPurchase,
    #[serde(rename = "balanceAfter")]
    pub balance_after: i64,
}

/// Outcome of ending or expiring boosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostsEndedResponse {
    pub ended: u64,
}

/// A user's balance and ledger history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditsResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub balance: i64,
    pub transactions: Vec<CreditTransaction>,
}
