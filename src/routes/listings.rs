use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use std::collections::HashMap;
use validator::Validate;

use crate::models::{EntityType, ListableEntity, SearchListingsRequest};
use crate::routes::{error_response, AppState};
use crate::services::{CacheKey, StoreError};

/// Configure listing routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/listings/search", web::post().to(search_listings))
        .route("/listings/{entity_type}/refresh", web::post().to(refresh_listings));
}

/// Listing documents for one vertical, from cache when possible, with the
/// ledger's boost fields laid over them
pub async fn load_listings(
    state: &AppState,
    entity_type: EntityType,
) -> Result<Vec<ListableEntity>, StoreError> {
    let cache_key = CacheKey::listings(entity_type);

    let mut entities = match state.cache.get::<Vec<ListableEntity>>(&cache_key).await {
        Ok(entities) => entities,
        Err(_) => {
            let fetched = state.listings.list_entities(entity_type, true).await?;
            if let Err(e) = state.cache.set(&cache_key, &fetched).await {
                tracing::warn!("Failed to cache {} listings: {}", entity_type, e);
            }
            fetched
        }
    };

    match state.ledger_store.list_boost_states(entity_type).await {
        Ok(states) => {
            let by_id: HashMap<&str, _> = states
                .iter()
                .map(|s| (s.entity_id.as_str(), s))
                .collect();
            for entity in entities.iter_mut() {
                if let Some(boost) = by_id.get(entity.id.as_str()) {
                    entity.apply_boost_state(boost);
                }
            }
        }
        Err(e) => {
            tracing::warn!("Boost states unavailable for {}, using stored flags: {}", entity_type, e);
        }
    }

    Ok(entities)
}

/// Search listings endpoint
///
/// POST /api/v1/listings/search
///
/// Request body:
/// ```json
/// {
///   "entityType": "product|job|event|artiste",
///   "criteria": {
///     "searchQuery": "bike",
///     "priceMin": "100",
///     "originCoordinate": { "latitude": 43.65, "longitude": -79.38 },
///     "radiusKm": 25,
///     "sortMode": "distance"
///   },
///   "page": 1,
///   "pageSize": 20
/// }
/// ```
async fn search_listings(
    state: web::Data<AppState>,
    req: web::Json<SearchListingsRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return error_response(StatusCode::BAD_REQUEST, "Validation failed", errors.to_string());
    }

    let req = req.into_inner();

    let entities = match load_listings(&state, req.entity_type).await {
        Ok(entities) => entities,
        Err(e) => {
            tracing::error!("Failed to load {} listings: {}", req.entity_type, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load listings",
                e.to_string(),
            );
        }
    };

    let page = state
        .engine
        .search(entities, &req.criteria, req.page, req.page_size);

    tracing::info!(
        "Returning {} of {} {} listings (page {}/{})",
        page.items.len(),
        page.total_items,
        req.entity_type,
        page.page,
        page.total_pages
    );

    HttpResponse::Ok().json(page)
}

/// Drop the cached documents of a vertical after listings change
///
/// POST /api/v1/listings/{entityType}/refresh
async fn refresh_listings(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let entity_type = match path.parse::<EntityType>() {
        Ok(entity_type) => entity_type,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "Invalid entity type", e),
    };

    match state.cache.delete(&CacheKey::listings(entity_type)).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => {
            tracing::error!("Failed to invalidate {} listings: {}", entity_type, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to invalidate cache",
                e.to_string(),
            )
        }
    }
}
