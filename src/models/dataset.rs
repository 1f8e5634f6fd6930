// Dataset Model
// Flat records shared by the live service and the embedded fallback

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of the analytics dataset: field name to scalar value.
pub type DatasetRecord = Map<String, Value>;

/// Where a resolved dataset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Fetched from the data service
    Live,
    /// Embedded sample data
    Fallback,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Live => "live",
            DataSource::Fallback => "fallback",
        }
    }
}

/// Dataset handed to the chart renderer, tagged with its freshness
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDataset {
    pub records: Vec<DatasetRecord>,
    pub source: DataSource,
}

impl ResolvedDataset {
    pub fn is_fallback(&self) -> bool {
        self.source == DataSource::Fallback
    }
}

/// Text form of a scalar field. Non-scalar and null values yield `None`.
pub fn field_text(record: &DatasetRecord, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric form of a scalar field. Numeric strings are accepted.
pub fn field_number(record: &DatasetRecord, field: &str) -> Option<f64> {
    match record.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Truthiness of a win/result style field.
pub fn field_flag(record: &DatasetRecord, field: &str) -> bool {
    match record.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Some(Value::String(s)) => parse_flag(s),
        _ => false,
    }
}

pub(crate) fn parse_flag(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    lower.contains("win")
        || matches!(lower.as_str(), "yes" | "y" | "true" | "1")
}
