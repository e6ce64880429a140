use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::router::ProductReplyMode;
use crate::store::firestore::FirestoreConfig;

const DEFAULT_MODEL: &str = "gemini-1.5-pro-002";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_STORE_NAME: &str = "Ricchy";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_name: String,
    pub gemini: GeminiConfig,
    pub product_reply: ProductReplyMode,
    pub backend: Backend,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Where products are read from and records are written to.
#[derive(Debug, Clone)]
pub enum Backend {
    Firestore(FirestoreConfig),
    Local { catalog_path: PathBuf, data_dir: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for `{key}`: `{value}` ({reason})")]
    Invalid { key: String, value: String, reason: String },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout = match get("GEMINI_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "GEMINI_TIMEOUT_SECS".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let timeout = Duration::from_secs(timeout);

        let product_reply = match get("ROUTER_PRODUCT_REPLY") {
            Some(raw) => raw.parse::<ProductReplyMode>().map_err(|reason| ConfigError::Invalid {
                key: "ROUTER_PRODUCT_REPLY".to_string(),
                value: raw.clone(),
                reason,
            })?,
            None => ProductReplyMode::default(),
        };

        let backend = match get("FIRESTORE_PROJECT_ID") {
            Some(project_id) => Backend::Firestore(FirestoreConfig {
                project_id,
                base_url: get("FIRESTORE_BASE_URL").unwrap_or_else(|| DEFAULT_FIRESTORE_BASE_URL.to_string()),
                database: get("FIRESTORE_DATABASE").unwrap_or_else(|| "(default)".to_string()),
                access_token: get("FIRESTORE_ACCESS_TOKEN"),
                api_key: get("FIRESTORE_API_KEY"),
                timeout,
            }),
            None => Backend::Local {
                catalog_path: get("CATALOG_PATH").unwrap_or_else(|| "catalog.json".to_string()).into(),
                data_dir: get("DATA_DIR").unwrap_or_else(|| "data".to_string()).into(),
            },
        };

        Ok(Self {
            store_name: get("STORE_NAME").unwrap_or_else(|| DEFAULT_STORE_NAME.to_string()),
            gemini: GeminiConfig {
                api_key: get("GEMINI_API_KEY"),
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                timeout,
            },
            product_reply,
            backend,
        })
    }
}
