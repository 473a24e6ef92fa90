use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use market_algo::config::{LoggingSettings, Settings};
use market_algo::core::{BoostLedger, ListingEngine};
use market_algo::routes::{self, AppState};
use market_algo::services::{
    AppwriteClient, AppwriteCollections, CacheManager, LedgerStore, ListingSource, MemoryStore,
    PostgresClient,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match logging.format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            tracing_subscriber::fmt().init();
            return Err(startup_error("Configuration error", e));
        }
    };

    init_tracing(&settings.logging);

    info!("Starting Market Algo listing service...");

    // Initialize Appwrite client
    let appwrite_collections = AppwriteCollections {
        products: settings.collection.products,
        jobs: settings.collection.jobs,
        events: settings.collection.events,
        artistes: settings.collection.artistes,
    };

    let appwrite = AppwriteClient::new(
        settings.appwrite.endpoint,
        settings.appwrite.api_key,
        settings.appwrite.project_id,
        settings.appwrite.database_id,
        appwrite_collections,
        settings.listings.fetch_limit,
    )
    .map_err(|e| startup_error("Appwrite client error", e))?;
    let listings: Arc<dyn ListingSource> = Arc::new(appwrite);

    info!("Appwrite client initialized");

    // Initialize cache manager; Redis is optional
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(60);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(64);

    let cache = match &settings.cache.redis_url {
        Some(redis_url) => match CacheManager::new(redis_url, l1_cache_size, cache_ttl).await {
            Ok(c) => {
                info!("Cache manager initialized with Redis (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
                c
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), caching in process only", e);
                CacheManager::local_only(l1_cache_size, cache_ttl)
            }
        },
        None => {
            info!("No Redis configured, caching in process only (TTL: {}s)", cache_ttl);
            CacheManager::local_only(l1_cache_size, cache_ttl)
        }
    };
    let cache = Arc::new(cache);

    // Initialize the credit ledger store
    let (ledger_store, postgres): (Arc<dyn LedgerStore>, Option<Arc<PostgresClient>>) =
        if settings.database.enabled {
            let client = PostgresClient::from_settings(
                &settings.database.url,
                settings.database.max_connections,
                settings.database.min_connections,
                settings.database.acquire_timeout_secs,
                settings.database.idle_timeout_secs,
            )
            .await
            .map_err(|e| startup_error("PostgreSQL connection error", e))?;
            let client = Arc::new(client);
            let store: Arc<dyn LedgerStore> = client.clone();

            info!(
                "PostgreSQL client initialized (max: {} connections)",
                settings.database.max_connections.unwrap_or(10)
            );
            (store, Some(client))
        } else {
            warn!("Database disabled, credit ledger is held in memory and lost on restart");
            let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());
            (store, None)
        };

    let ledger = BoostLedger::new(ledger_store.clone());
    let engine = ListingEngine::new(
        settings.listings.default_page_size,
        settings.listings.max_page_size,
    );

    info!("Listing engine initialized: {:?}", engine);

    // Build application state
    let app_state = AppState {
        listings,
        ledger_store,
        ledger,
        cache,
        engine,
        postgres,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
