// Route exports
pub mod boosts;
pub mod listings;

use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

use crate::core::{BoostLedger, ListingEngine};
use crate::models::{ErrorResponse, HealthResponse};
use crate::services::{CacheManager, LedgerStore, ListingSource, PostgresClient};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub listings: Arc<dyn ListingSource>,
    pub ledger_store: Arc<dyn LedgerStore>,
    pub ledger: BoostLedger,
    pub cache: Arc<CacheManager>,
    pub engine: ListingEngine,
    /// Present when the ledger is backed by PostgreSQL
    pub postgres: Option<Arc<PostgresClient>>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health_check))
            .configure(listings::configure)
            .configure(boosts::configure),
    );
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_healthy = match &state.postgres {
        Some(postgres) => postgres.health_check().await.unwrap_or(false),
        None => true,
    };

    let status = if db_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

pub(crate) fn error_response(status: actix_web::http::StatusCode, error: &str, message: String) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: status.as_u16(),
    })
}
