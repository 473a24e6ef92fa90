use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub appwrite: AppwriteSettings,
    pub collection: CollectionSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub listings: ListingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppwriteSettings {
    pub endpoint: String,
    pub api_key: String,
    pub project_id: String,
    pub database_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    pub products: String,
    pub jobs: String,
    pub events: String,
    pub artistes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// When false the ledger runs in memory (local development only)
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

fn default_true() -> bool { true }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingSettings {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

fn default_page_size() -> usize { 20 }
fn default_max_page_size() -> usize { 100 }
fn default_fetch_limit() -> usize { 500 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with MARKET__)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., MARKET__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("MARKET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("MARKET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply the conventional variables deployment platforms set directly
///
/// `DATABASE_URL` and `REDIS_URL` win over file values; the Appwrite
/// credentials may also come from `MARKET_APPWRITE__*`.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }
    if let Ok(redis_url) = env::var("REDIS_URL") {
        builder = builder.set_override("cache.redis_url", redis_url)?;
    }

    let appwrite_overrides = [
        ("MARKET_APPWRITE__ENDPOINT", "appwrite.endpoint"),
        ("MARKET_APPWRITE__API_KEY", "appwrite.api_key"),
        ("MARKET_APPWRITE__PROJECT_ID", "appwrite.project_id"),
        ("MARKET_APPWRITE__DATABASE_ID", "appwrite.database_id"),
    ];
    for (var, key) in appwrite_overrides {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listing_settings() {
        let listings = ListingSettings::default();
        assert_eq!(listings.default_page_size, 20);
        assert_eq!(listings.max_page_size, 100);
        assert_eq!(listings.fetch_limit, 500);
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("market-algo-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [appwrite]
            endpoint = "https://appwrite.test/v1"
            api_key = "key"
            project_id = "proj"
            database_id = "db"

            [collection]
            products = "p"
            jobs = "j"
            events = "e"
            artistes = "a"

            [database]
            enabled = false
            url = "postgres://localhost/test"

            [listings]
            max_page_size = 50
            "#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.server.port, 9000);
        assert!(!settings.database.enabled);
        assert_eq!(settings.listings.max_page_size, 50);
        assert_eq!(settings.listings.default_page_size, 20);
        assert!(settings.cache.redis_url.is_none());
        assert_eq!(settings.logging.format, "json");
    }
}
