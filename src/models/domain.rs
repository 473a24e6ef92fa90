use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::filters::{parse_bound, sanitize_bound};

/// Default search radius when the caller does not supply one
pub const DEFAULT_RADIUS_KM: f64 = 50.0;

/// Largest single credit grant accepted
pub const MAX_GRANT_CREDITS: i64 = 1_000_000_000;

/// A point on the globe in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Kind of listing an entity (or a boost) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Product,
    Job,
    Event,
    Artiste,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Product,
        EntityType::Job,
        EntityType::Event,
        EntityType::Artiste,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Product => "product",
            EntityType::Job => "job",
            EntityType::Event => "event",
            EntityType::Artiste => "artiste",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "product" => Ok(EntityType::Product),
            "job" => Ok(EntityType::Job),
            "event" => Ok(EntityType::Event),
            "artiste" => Ok(EntityType::Artiste),
            other => Err(format!("unknown entity type: {}", other)),
        }
    }
}

/// A product, job, event or artiste listing as seen by the search pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListableEntity {
    pub id: String,
    #[serde(rename = "entityType")]
    pub entity_type: EntityType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(rename = "salaryMin", default)]
    pub salary_min: Option<f64>,
    #[serde(rename = "salaryMax", default)]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "isActive", default = "default_true")]
    pub is_active: bool,
    #[serde(rename = "isBoosted", default)]
    pub is_boosted: bool,
    #[serde(rename = "boostScore", default)]
    pub boost_score: u32,
    #[serde(rename = "boostExpiresAt", default)]
    pub boost_expires_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool { true }

impl ListableEntity {
    /// Title, description and tags joined for substring search
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(
            self.title.len() + self.description.len() + self.tags.len() * 8,
        );
        text.push_str(&self.title);
        text.push(' ');
        text.push_str(&self.description);
        for tag in &self.tags {
            text.push(' ');
            text.push_str(tag);
        }
        text
    }

    /// Amount used for price sorting: the price, or the salary floor for jobs
    pub fn sort_price(&self) -> Option<f64> {
        self.price.or(self.salary_min)
    }

    /// Whether the boost flag is still in effect at `now`
    ///
    /// The stored flag is never trusted on its own: a boost whose expiry has
    /// passed counts as unboosted even if nothing has swept it yet.
    pub fn is_boosted_at(&self, now: DateTime<Utc>) -> bool {
        self.is_boosted && self.boost_expires_at.map_or(true, |expires| now <= expires)
    }

    /// Boost score that applies at `now` (zero once the boost has lapsed)
    pub fn effective_boost_score(&self, now: DateTime<Utc>) -> u32 {
        if self.is_boosted_at(now) {
            self.boost_score
        } else {
            0
        }
    }

    /// Copy boost fields from the ledger's view of this entity
    pub fn apply_boost_state(&mut self, state: &EntityBoostState) {
        self.is_boosted = state.is_boosted;
        self.boost_score = state.boost_score;
        self.boost_expires_at = state.boost_expires_at;
    }
}

/// Sort order applied at the end of the filter pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    #[default]
    Newest,
    PriceLow,
    PriceHigh,
    Boosted,
    Distance,
}

/// Filter and sort criteria for a listing search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(rename = "searchQuery", default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "priceMin", default, deserialize_with = "lenient_bound")]
    pub price_min: Option<f64>,
    #[serde(rename = "priceMax", default, deserialize_with = "lenient_bound")]
    pub price_max: Option<f64>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(rename = "radiusKm", default = "default_radius_km", deserialize_with = "lenient_radius")]
    pub radius_km: f64,
    #[serde(rename = "originCoordinate", default)]
    pub origin: Option<Coordinate>,
    #[serde(rename = "sortMode", default)]
    pub sort_mode: SortMode,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            search_query: None,
            category: None,
            price_min: None,
            price_max: None,
            city: None,
            state: None,
            radius_km: DEFAULT_RADIUS_KM,
            origin: None,
            sort_mode: SortMode::Newest,
        }
    }
}

fn default_radius_km() -> f64 { DEFAULT_RADIUS_KM }

/// Accept a bound as a JSON number or string; anything unusable is no bound
fn lenient_bound<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64().and_then(sanitize_bound),
        serde_json::Value::String(s) => parse_bound(&s),
        _ => None,
    }))
}

fn lenient_radius<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_bound(deserializer)?.unwrap_or(DEFAULT_RADIUS_KM))
}

/// An entity that survived the filter pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntity {
    #[serde(flatten)]
    pub entity: ListableEntity,
    #[serde(rename = "distanceKm", skip_serializing_if = "Option::is_none", default)]
    pub distance_km: Option<f64>,
}

impl From<ListableEntity> for RankedEntity {
    fn from(entity: ListableEntity) -> Self {
        Self { entity, distance_km: None }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    #[serde(rename = "pageSize")]
    pub page_size: usize,
    #[serde(rename = "totalItems")]
    pub total_items: usize,
    #[serde(rename = "totalPages")]
    pub total_pages: usize,
}

/// Spendable credits held by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub balance: i64,
}

/// Append-only ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub amount: i64,
    #[serde(rename = "balanceAfter")]
    pub balance_after: i64,
    pub description: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A purchasable boost duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostPlan {
    #[serde(rename = "durationDays")]
    pub duration_days: u32,
    #[serde(rename = "creditsCost")]
    pub credits_cost: i64,
}

/// Fixed plan catalog. Longer plans are cheaper per day.
pub const BOOST_PLANS: [BoostPlan; 3] = [
    BoostPlan { duration_days: 7, credits_cost: 100 },
    BoostPlan { duration_days: 14, credits_cost: 180 },
    BoostPlan { duration_days: 30, credits_cost: 300 },
];

impl BoostPlan {
    pub fn for_duration(duration_days: u32) -> Option<BoostPlan> {
        BOOST_PLANS
            .iter()
            .copied()
            .find(|plan| plan.duration_days == duration_days)
    }

    /// Sort weight granted to a boosted entity
    pub fn boost_score(&self) -> u32 {
        self.duration_days * 10
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.duration_days))
    }
}

/// Record of a bought boost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostPurchase {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "entityType")]
    pub entity_type: EntityType,
    #[serde(rename = "entityId")]
    pub entity_id: String,
    #[serde(rename = "creditsSpent")]
    pub credits_spent: i64,
    #[serde(rename = "startAt")]
    pub start_at: DateTime<Utc>,
    #[serde(rename = "endAt")]
    pub end_at: DateTime<Utc>,
    #[serde(rename = "isActive")]
    pub is_active: bool,
}

impl BoostPurchase {
    /// Active and not yet past its end time
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now <= self.end_at
    }
}

/// Boost fields as written onto an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBoostState {
    #[serde(rename = "entityType")]
    pub entity_type: EntityType,
    #[serde(rename = "entityId")]
    pub entity_id: String,
    #[serde(rename = "isBoosted")]
    pub is_boosted: bool,
    #[serde(rename = "boostScore")]
    pub boost_score: u32,
    #[serde(rename = "boostExpiresAt")]
    pub boost_expires_at: Option<DateTime<Utc>>,
}

impl EntityBoostState {
    pub fn cleared(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            is_boosted: false,
            boost_score: 0,
            boost_expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_catalog() {
        assert_eq!(BoostPlan::for_duration(7).map(|p| p.credits_cost), Some(100));
        assert_eq!(BoostPlan::for_duration(14).map(|p| p.credits_cost), Some(180));
        assert_eq!(BoostPlan::for_duration(30).map(|p| p.credits_cost), Some(300));
        assert!(BoostPlan::for_duration(10).is_none());
        assert_eq!(BOOST_PLANS[1].boost_score(), 140);
    }

    #[test]
    fn test_criteria_lenient_bounds() {
        let criteria: FilterCriteria = serde_json::from_str(
            r#"{"priceMin": "abc", "priceMax": "250.5", "radiusKm": "far", "sortMode": "priceHigh"}"#,
        )
        .unwrap();

        assert_eq!(criteria.price_min, None);
        assert_eq!(criteria.price_max, Some(250.5));
        assert_eq!(criteria.radius_km, DEFAULT_RADIUS_KM);
        assert_eq!(criteria.sort_mode, SortMode::PriceHigh);
    }

    #[test]
    fn test_criteria_defaults() {
        let criteria: FilterCriteria = serde_json::from_str("{}").unwrap();
        assert_eq!(criteria, FilterCriteria::default());
    }

    #[test]
    fn test_entity_type_round_trip_str() {
        for entity_type in EntityType::ALL {
            assert_eq!(entity_type.as_str().parse::<EntityType>(), Ok(entity_type));
        }
        assert!("service".parse::<EntityType>().is_err());
    }
}
