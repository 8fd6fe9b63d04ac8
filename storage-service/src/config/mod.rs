use crate::authz::DEFAULT_MAX_DEPTH;
use serde::Deserialize;
use service_core::config::{self as core_config, get_env, get_env_parsed};
use service_core::error::AppError;
use std::env;

/// Longest lifetime a presigned download URL may be configured with (7 days).
pub const MAX_PRESIGN_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct StorageServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub store: StoreBackend,
    pub mongodb: Option<MongoConfig>,
    pub storage: BlobConfig,
    pub events: EventsConfig,
    pub authz: AuthzConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongodb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlobConfig {
    pub local_path: String,
    pub public_base_url: String,
    pub signing_secret: String,
    pub presign_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// No URL means events stay in process.
    pub redis_url: Option<String>,
    pub channel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthzConfig {
    pub max_depth: usize,
}

impl StorageServiceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = core_config::is_prod();

        let store: StoreBackend = get_env("STORE_BACKEND", Some("memory"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let mongodb = match store {
            StoreBackend::Mongodb => Some(MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("storage_db"), is_prod)?,
            }),
            StoreBackend::Memory => None,
        };

        let max_depth: usize = get_env_parsed("AUTHZ_MAX_DEPTH", DEFAULT_MAX_DEPTH)?;
        if max_depth == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "AUTHZ_MAX_DEPTH must be at least 1"
            )));
        }

        Ok(StorageServiceConfig {
            common,
            store,
            mongodb,
            storage: BlobConfig {
                local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), is_prod)?,
                public_base_url: get_env(
                    "PUBLIC_BASE_URL",
                    Some("http://localhost:8080"),
                    is_prod,
                )?,
                signing_secret: get_env(
                    "SIGNING_SECRET",
                    Some("dev-signing-secret-change-me"),
                    is_prod,
                )?,
                presign_ttl_seconds: check_presign_ttl(get_env_parsed(
                    "PRESIGN_TTL_SECONDS",
                    900,
                )?)?,
            },
            events: EventsConfig {
                redis_url: env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),
                channel: get_env_parsed(
                    "EVENTS_CHANNEL",
                    "storage.resource-events".to_string(),
                )?,
            },
            authz: AuthzConfig { max_depth },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|e| !e.is_empty()),
        })
    }
}

fn check_presign_ttl(ttl: u64) -> Result<u64, AppError> {
    if ttl == 0 || ttl > MAX_PRESIGN_TTL_SECONDS {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "PRESIGN_TTL_SECONDS must be between 1 and {}",
            MAX_PRESIGN_TTL_SECONDS
        )));
    }
    Ok(ttl)
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StoreBackend::Mongodb),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}
