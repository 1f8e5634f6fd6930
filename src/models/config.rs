// Service Configuration Model
// Settings for the optional dataset service, read from DATALAB_* variables

use std::env;
use std::path::PathBuf;

use serde::Serialize;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DATASET: &str = "grammy";
const DEFAULT_KAGGLE_OWNER: &str = "johnpendenque";
const DEFAULT_KAGGLE_SLUG: &str = "grammy-winners-and-nominees-from-1965-to-2024";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:*,http://127.0.0.1:*,null";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOG_RETENTION_DAYS: u32 = 14;

/// Where the service loads its dataset from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DatasetSourceConfig {
    /// Plain CSV (or ZIP containing a CSV) at a URL
    Url { url: String },
    /// Kaggle dataset download, authenticated with basic auth
    Kaggle {
        owner: String,
        slug: String,
        #[serde(skip_serializing)]
        username: String,
        #[serde(skip_serializing)]
        key: String,
    },
    /// CSV file on local disk (read only)
    File { path: PathBuf },
    /// No source configured; every load fails
    Unconfigured,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub dataset_name: String,
    pub source: DatasetSourceConfig,
    pub cors_origins: Vec<String>,
    pub ui_dir: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub log_retention_days: u32,
    pub eager_load: bool,
    pub fetch_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            dataset_name: DEFAULT_DATASET.to_string(),
            source: DatasetSourceConfig::Unconfigured,
            cors_origins: split_list(DEFAULT_CORS_ORIGINS),
            ui_dir: None,
            log_dir: PathBuf::from("logs"),
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
            eager_load: false,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl ServiceConfig {
    /// Build configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let source = if let Some(url) = get("DATALAB_SOURCE_URL") {
            DatasetSourceConfig::Url { url }
        } else if let Some(path) = get("DATALAB_SOURCE_FILE") {
            DatasetSourceConfig::File { path: PathBuf::from(path) }
        } else if let (Some(username), Some(key)) = (get("KAGGLE_USERNAME"), get("KAGGLE_KEY")) {
            DatasetSourceConfig::Kaggle {
                owner: get("DATALAB_KAGGLE_OWNER").unwrap_or_else(|| DEFAULT_KAGGLE_OWNER.to_string()),
                slug: get("DATALAB_KAGGLE_SLUG").unwrap_or_else(|| DEFAULT_KAGGLE_SLUG.to_string()),
                username,
                key,
            }
        } else {
            DatasetSourceConfig::Unconfigured
        };

        Self {
            host: get("DATALAB_HOST").unwrap_or(defaults.host),
            port: get("DATALAB_PORT")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.port),
            dataset_name: get("DATALAB_DATASET").unwrap_or(defaults.dataset_name),
            source,
            cors_origins: get("DATALAB_CORS_ORIGINS")
                .map(|value| split_list(&value))
                .unwrap_or(defaults.cors_origins),
            ui_dir: get("DATALAB_UI_DIR").map(PathBuf::from),
            log_dir: get("DATALAB_LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir),
            log_retention_days: get("DATALAB_LOG_RETENTION_DAYS")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.log_retention_days),
            eager_load: get("DATALAB_EAGER_LOAD")
                .and_then(|value| parse_bool(&value))
                .unwrap_or(defaults.eager_load),
            fetch_timeout_secs: get("DATALAB_FETCH_TIMEOUT_SECS")
                .and_then(|value| value.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.fetch_timeout_secs),
        }
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
