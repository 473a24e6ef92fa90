use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use validator::Validate;

use crate::core::{BoostLedger, LedgerError};
use crate::models::{
    BoostsEndedResponse, CreditsResponse, EndBoostRequest, GrantCreditsRequest, PlansResponse,
    PurchaseBoostRequest, PurchaseBoostResponse,
};
use crate::routes::{error_response, AppState};

/// Configure boost and credit routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/boosts/plans", web::get().to(list_plans))
        .route("/boosts/purchase", web::post().to(purchase_boost))
        .route("/boosts/end", web::post().to(end_boost))
        .route("/boosts/expire", web::post().to(expire_boosts))
        .route("/credits/grant", web::post().to(grant_credits))
        .route("/credits/{user_id}", web::get().to(get_credits));
}

/// Map ledger failures to distinct HTTP responses
fn ledger_error_response(err: &LedgerError) -> HttpResponse {
    let status = match err {
        LedgerError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
        LedgerError::AlreadyBoosted { .. } => StatusCode::CONFLICT,
        LedgerError::UnknownPlan(_) | LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if err.is_rejection() {
        tracing::info!("Ledger rejection: {}", err);
    } else {
        tracing::error!("Ledger failure: {}", err);
    }

    error_response(status, err.code(), err.to_string())
}

async fn list_plans() -> impl Responder {
    HttpResponse::Ok().json(PlansResponse {
        plans: BoostLedger::plans().to_vec(),
    })
}

/// Purchase boost endpoint
///
/// POST /api/v1/boosts/purchase
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "entityType": "product|job|event|artiste",
///   "entityId": "string",
///   "durationDays": 7
/// }
/// ```
///
/// Rejections answer 409 `already_boosted` or 402 `insufficient_credits`.
async fn purchase_boost(
    state: web::Data<AppState>,
    req: web::Json<PurchaseBoostRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return error_response(StatusCode::BAD_REQUEST, "Validation failed", errors.to_string());
    }

    let plan = match BoostLedger::plan_for(req.duration_days) {
        Ok(plan) => plan,
        Err(e) => return ledger_error_response(&e),
    };

    match state
        .ledger
        .purchase_boost(&req.user_id, req.entity_type, &req.entity_id, plan)
        .await
    {
        Ok(receipt) => HttpResponse::Ok().json(PurchaseBoostResponse {
            balance_after: receipt.transaction.balance_after,
            purchase: receipt.purchase,
        }),
        Err(e) => ledger_error_response(&e),
    }
}

/// End a boost early
///
/// POST /api/v1/boosts/end
async fn end_boost(
    state: web::Data<AppState>,
    req: web::Json<EndBoostRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return error_response(StatusCode::BAD_REQUEST, "Validation failed", errors.to_string());
    }

    match state.ledger.end_boost(req.entity_type, &req.entity_id).await {
        Ok(ended) => HttpResponse::Ok().json(BoostsEndedResponse { ended: u64::from(ended) }),
        Err(e) => ledger_error_response(&e),
    }
}

/// Sweep boosts past their end time; meant for a scheduler to call
///
/// POST /api/v1/boosts/expire
async fn expire_boosts(state: web::Data<AppState>) -> impl Responder {
    match state.ledger.expire_boosts(chrono::Utc::now()).await {
        Ok(ended) => HttpResponse::Ok().json(BoostsEndedResponse { ended }),
        Err(e) => ledger_error_response(&e),
    }
}

/// Balance and ledger history
///
/// GET /api/v1/credits/{userId}
async fn get_credits(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let user_id = path.into_inner();

    let balance = match state.ledger.balance(&user_id).await {
        Ok(balance) => balance,
        Err(e) => return ledger_error_response(&e),
    };

    match state.ledger.transactions(&user_id).await {
        Ok(transactions) => HttpResponse::Ok().json(CreditsResponse {
            user_id,
            balance: balance.balance,
            transactions,
        }),
        Err(e) => ledger_error_response(&e),
    }
}

/// Credit a user's balance, e.g. from a payment webhook
///
/// POST /api/v1/credits/grant
async fn grant_credits(
    state: web::Data<AppState>,
    req: web::Json<GrantCreditsRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return error_response(StatusCode::BAD_REQUEST, "Validation failed", errors.to_string());
    }

    match state
        .ledger
        .grant_credits(&req.user_id, req.amount, &req.description)
        .await
    {
        Ok(transaction) => HttpResponse::Ok().json(transaction),
        Err(e) => ledger_error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ListingEngine;
    use crate::models::{Coordinate, EntityType, ListableEntity, Page, RankedEntity};
    use crate::routes::configure_routes;
    use crate::services::{CacheManager, MemoryStore};
    use actix_web::{test, App};
    use std::sync::Arc;

    fn listing(id: &str) -> ListableEntity {
        ListableEntity {
            id: id.to_string(),
            entity_type: EntityType::Product,
            title: format!("Guitar {}", id),
            description: "Acoustic".to_string(),
            tags: vec![],
            category: "music".to_string(),
            price: Some(250.0),
            salary_min: None,
            salary_max: None,
            city: Some("Toronto".to_string()),
            state: Some("ON".to_string()),
            coordinate: Some(Coordinate::new(43.6532, -79.3832)),
            created_at: chrono::Utc::now(),
            is_active: true,
            is_boosted: false,
            boost_score: 0,
            boost_expires_at: None,
        }
    }

    async fn state_with(store: Arc<MemoryStore>) -> AppState {
        AppState {
            listings: store.clone(),
            ledger_store: store.clone(),
            ledger: BoostLedger::new(store),
            cache: Arc::new(CacheManager::local_only(16, 60)),
            engine: ListingEngine::default(),
            postgres: None,
        }
    }

    #[actix_web::test]
    async fn test_purchase_then_search_boosted() {
        let store = Arc::new(MemoryStore::with_entities(vec![listing("a"), listing("b")]));
        store.set_balance("u1", 100).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(store).await))
                .configure(configure_routes),
        )
        .await;

        // Warm the listing cache before the purchase
        let req = test::TestRequest::post()
            .uri("/api/v1/listings/search")
            .set_json(serde_json::json!({ "entityType": "product" }))
            .to_request();
        let page: Page<RankedEntity> = test::call_and_read_body_json(&app, req).await;
        assert!(page.items.iter().all(|r| !r.entity.is_boosted));

        let req = test::TestRequest::post()
            .uri("/api/v1/boosts/purchase")
            .set_json(serde_json::json!({
                "userId": "u1", "entityType": "product", "entityId": "b", "durationDays": 7
            }))
            .to_request();
        let resp: PurchaseBoostResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.balance_after, 0);

        let req = test::TestRequest::post()
            .uri("/api/v1/listings/search")
            .set_json(serde_json::json!({
                "entityType": "product",
                "criteria": { "sortMode": "boosted", "priceMin": "not a number" }
            }))
            .to_request();
        let page: Page<RankedEntity> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.total_items, 2);
        assert_eq!(page.items[0].entity.id, "b");
        assert_eq!(page.items[0].entity.boost_score, 70);
    }

    #[actix_web::test]
    async fn test_rejections_have_distinct_statuses() {
        let store = Arc::new(MemoryStore::with_entities(vec![listing("a")]));
        store.set_balance("rich", 1_000).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(store).await))
                .configure(configure_routes),
        )
        .await;

        let purchase = |user: &str| {
            test::TestRequest::post()
                .uri("/api/v1/boosts/purchase")
                .set_json(serde_json::json!({
                    "userId": user, "entityType": "product", "entityId": "a", "durationDays": 30
                }))
                .to_request()
        };

        let resp = test::call_service(&app, purchase("broke")).await;
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);

        let resp = test::call_service(&app, purchase("rich")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(&app, purchase("rich")).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/api/v1/boosts/purchase")
            .set_json(serde_json::json!({
                "userId": "rich", "entityType": "product", "entityId": "a", "durationDays": 3
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_grant_and_read_credits() {
        let store = Arc::new(MemoryStore::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(store).await))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/credits/grant")
            .set_json(serde_json::json!({ "userId": "u9", "amount": 250 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let req = test::TestRequest::get().uri("/api/v1/credits/u9").to_request();
        let credits: CreditsResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(credits.balance, 250);
        assert_eq!(credits.transactions.len(), 1);
        assert_eq!(credits.transactions[0].balance_after, 250);
    }
}
