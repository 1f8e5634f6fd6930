// Dataset Provider
// One fetch attempt against the data service, with the embedded sample data
// as a total fallback. Callers never see an error.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::models::{DataSource, DatasetRecord, ResolvedDataset};

/// Bounded wait before the fallback is used
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(4);

const FALLBACK_JSON: &str = include_str!("../../data/grammy-fallback.json");

static FALLBACK_DATASET: OnceLock<Vec<DatasetRecord>> = OnceLock::new();

#[derive(Error, Debug)]
enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Data service returned status {0}")]
    Status(u16),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Embedded sample records, same schema as the live dataset
pub fn fallback_dataset() -> &'static [DatasetRecord] {
    FALLBACK_DATASET.get_or_init(|| match parse_records(FALLBACK_JSON.as_bytes()) {
        Ok(records) => records,
        Err(e) => {
            log::error!("Embedded fallback dataset is invalid: {e}");
            Vec::new()
        }
    })
}

/// Parse a response body into records. Only a JSON array of objects is
/// accepted.
pub fn parse_records(body: &[u8]) -> Result<Vec<DatasetRecord>, String> {
    let value: Value = serde_json::from_slice(body).map_err(|e| format!("invalid JSON: {e}"))?;
    let Value::Array(items) = value else {
        return Err("expected a JSON array".to_string());
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(format!("element {index} is not an object: {other}")),
        })
        .collect()
}

pub struct DatasetProvider {
    client: Client,
    endpoint: Option<String>,
}

impl DatasetProvider {
    /// Provider for `endpoint`, e.g. `http://127.0.0.1:5000/api/grammy`
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let endpoint = if endpoint.trim().is_empty() {
            None
        } else {
            Some(endpoint)
        };
        Self {
            client: build_client(),
            endpoint,
        }
    }

    /// Provider without a data service; always resolves to the fallback
    pub fn offline() -> Self {
        Self {
            client: build_client(),
            endpoint: None,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Exactly one attempt, bounded by `timeout`. Any failure yields the
    /// fallback dataset tagged `DataSource::Fallback`.
    pub async fn resolve(&self, timeout: Duration) -> ResolvedDataset {
        let Some(endpoint) = self.endpoint.as_deref() else {
            log::debug!("No data service configured, using fallback dataset");
            return Self::fallback();
        };

        let started = Instant::now();
        let outcome = match tokio::time::timeout(timeout, self.fetch(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        };

        match outcome {
            Ok(records) => {
                log::info!(
                    "Loaded {} live record(s) from {endpoint} in {:?}",
                    records.len(),
                    started.elapsed()
                );
                ResolvedDataset {
                    records,
                    source: DataSource::Live,
                }
            }
            Err(e) => {
                log::warn!("Data service unavailable ({endpoint}): {e}; using fallback dataset");
                Self::fallback()
            }
        }
    }

    async fn fetch(&self, endpoint: &str) -> Result<Vec<DatasetRecord>, FetchError> {
        let response = self.client.get(endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        parse_records(&body).map_err(FetchError::Malformed)
    }

    fn fallback() -> ResolvedDataset {
        ResolvedDataset {
            records: fallback_dataset().to_vec(),
            source: DataSource::Fallback,
        }
    }
}

fn build_client() -> Client {
    Client::builder()
        .connect_timeout(DEFAULT_RESOLVE_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Failed to configure HTTP client, using defaults: {e}");
            Client::new()
        })
}
