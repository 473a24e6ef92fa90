use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::core::filters::{parse_bound, sanitize_bound};
use crate::models::{Coordinate, EntityType, ListableEntity};
use crate::services::store::{ListingSource, StoreError};

/// Errors that can occur when interacting with Appwrite
#[derive(Debug, Error)]
pub enum AppwriteError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid API key or token")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Collection IDs in Appwrite, one per listing vertical
#[derive(Debug, Clone)]
pub struct AppwriteCollections {
    pub products: String,
    pub jobs: String,
    pub events: String,
    pub artistes: String,
}

impl AppwriteCollections {
    pub fn for_type(&self, entity_type: EntityType) -> &str {
        match entity_type {
            EntityType::Product => &self.products,
            EntityType::Job => &self.jobs,
            EntityType::Event => &self.events,
            EntityType::Artiste => &self.artistes,
        }
    }
}

/// Appwrite API client
///
/// Reads listing documents from the marketplace collections.
pub struct AppwriteClient {
    base_url: String,
    api_key: String,
    project_id: String,
    database_id: String,
    client: Client,
    collections: AppwriteCollections,
    fetch_limit: usize,
}

/// Listing document as stored in Appwrite
///
/// Verticals name a few fields differently (events and artistes use `name`),
/// and older documents store amounts as strings.
#[derive(Debug, Deserialize)]
struct ListingDocument {
    #[serde(rename = "$id")]
    id: String,
    #[serde(rename = "$createdAt")]
    created_at: DateTime<Utc>,
    #[serde(alias = "name", default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(rename = "salaryMin", default)]
    salary_min: Option<Value>,
    #[serde(rename = "salaryMax", default)]
    salary_max: Option<Value>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(rename = "isActive", default)]
    is_active: Option<bool>,
    #[serde(rename = "isBoosted", default)]
    is_boosted: Option<bool>,
    #[serde(rename = "boostScore", default)]
    boost_score: Option<u32>,
    #[serde(rename = "boostExpiresAt", default)]
    boost_expires_at: Option<DateTime<Utc>>,
}

fn amount(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().and_then(sanitize_bound),
        Value::String(s) => parse_bound(&s),
        _ => None,
    }
}

impl ListingDocument {
    fn into_entity(self, entity_type: EntityType) -> ListableEntity {
        let coordinate = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        };

        ListableEntity {
            id: self.id,
            entity_type,
            title: self.title,
            description: self.description.unwrap_or_default(),
            tags: self.tags,
            category: self.category.unwrap_or_default(),
            price: amount(self.price),
            salary_min: amount(self.salary_min),
            salary_max: amount(self.salary_max),
            city: self.city,
            state: self.state,
            coordinate,
            created_at: self.created_at,
            is_active: self.is_active.unwrap_or(true),
            is_boosted: self.is_boosted.unwrap_or(false),
            boost_score: self.boost_score.unwrap_or(0),
            boost_expires_at: self.boost_expires_at,
        }
    }
}

impl AppwriteClient {
    /// Create a new Appwrite client
    pub fn new(
        base_url: String,
        api_key: String,
        project_id: String,
        database_id: String,
        collections: AppwriteCollections,
        fetch_limit: usize,
    ) -> Result<Self, AppwriteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url,
            api_key,
            project_id,
            database_id,
            client,
            collections,
            fetch_limit,
        })
    }

    fn documents_url(&self, collection: &str, queries: &[String]) -> String {
        let params = queries
            .iter()
            .map(|q| format!("queries[]={}", urlencoding::encode(q)))
            .collect::<Vec<_>>()
            .join("&");

        format!(
            "{}/databases/{}/collections/{}/documents?{}",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            collection,
            params
        )
    }

    /// Fetch the listing documents of one vertical
    pub async fn fetch_listings(
        &self,
        entity_type: EntityType,
        active_only: bool,
    ) -> Result<Vec<ListableEntity>, AppwriteError> {
        let mut queries = vec![
            "orderDesc(\"$createdAt\")".to_string(),
            format!("limit({})", self.fetch_limit),
        ];
        if active_only {
            queries.push("equal(\"isActive\", true)".to_string());
        }

        let url = self.documents_url(self.collections.for_type(entity_type), &queries);

        tracing::debug!("Fetching {} listings from: {}", entity_type, url);

        let response = self
            .client
            .get(&url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppwriteError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            tracing::error!("Failed to fetch {} listings: {} - {}", entity_type, status, body);
            return Err(AppwriteError::ApiError(format!(
                "Failed to fetch {} listings: {}",
                entity_type, status
            )));
        }

        let json: Value = response.json().await?;

        let total = json
            .get("total")
            .and_then(|t| t.as_u64())
            .unwrap_or(0);

        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| AppwriteError::InvalidResponse("Missing documents array".into()))?;

        let entities: Vec<ListableEntity> = documents
            .iter()
            .filter_map(|doc| {
                let data = doc.get("data").unwrap_or(doc);
                match serde_json::from_value::<ListingDocument>(data.clone()) {
                    Ok(document) => Some(document.into_entity(entity_type)),
                    Err(e) => {
                        tracing::warn!("Skipping malformed {} document: {}", entity_type, e);
                        None
                    }
                }
            })
            .filter(|entity| !active_only || entity.is_active)
            .collect();

        tracing::debug!("Fetched {} {} listings (total: {})", entities.len(), entity_type, total);

        Ok(entities)
    }
}

#[async_trait]
impl ListingSource for AppwriteClient {
    async fn list_entities(
        &self,
        entity_type: EntityType,
        active_only: bool,
    ) -> Result<Vec<ListableEntity>, StoreError> {
        Ok(self.fetch_listings(entity_type, active_only).await?)
    }
}
