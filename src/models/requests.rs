use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::{EntityType, FilterCriteria};

/// Request to search a listing collection
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchListingsRequest {
    #[serde(alias = "entity_type", rename = "entityType")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub criteria: FilterCriteria,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(alias = "page_size", rename = "pageSize")]
    pub page_size: Option<usize>,
}

fn default_page() -> usize {
    1
}

/// Request to buy a boost for a listing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PurchaseBoostRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[serde(alias = "entity_type", rename = "entityType")]
    pub entity_type: EntityType,
    #[validate(length(min = 1))]
    #[serde(alias = "entity_id", rename = "entityId")]
    pub entity_id: String,
    #[serde(alias = "duration_days", rename = "durationDays")]
    pub duration_days: u32,
}

/// Request to end a boost before its expiry
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EndBoostRequest {
    #[serde(alias = "entity_type", rename = "entityType")]
    pub entity_type: EntityType,
    #[validate(length(min = 1))]
    #[serde(alias = "entity_id", rename = "entityId")]
    pub entity_id: String,
}

/// Request to credit a user's balance
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GrantCreditsRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(range(min = 1, max = 1_000_000_000))]
    pub amount: i64,
    #[validate(length(min = 1, max = 200))]
    #[serde(default = "default_grant_description")]
    pub description: String,
}

fn default_grant_description() -> String {
    "Credit top-up".to_string()
}
