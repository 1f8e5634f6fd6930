// Chart Model
// Declarative description of one chart: kind, title and field-to-channel mapping

use serde::{Deserialize, Serialize};

use super::dataset::{field_flag, field_text, DatasetRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Doughnut,
    PolarArea,
    Scatter,
}

impl ChartKind {
    /// Chart.js `type` string
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
            ChartKind::PolarArea => "polarArea",
            ChartKind::Scatter => "scatter",
        }
    }

    /// Kinds drawn on x/y axes (and therefore carrying grid lines)
    pub fn has_axes(&self) -> bool {
        matches!(self, ChartKind::Bar | ChartKind::Line | ChartKind::Scatter)
    }

    /// Kinds drawn on a radial scale
    pub fn has_radial_scale(&self) -> bool {
        matches!(self, ChartKind::PolarArea)
    }
}

/// How values sharing a label are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    /// Number of records per label (value field ignored)
    #[default]
    Count,
    Sum,
    Mean,
    /// Mean as a percentage, rounded to two decimals
    Rate,
}

/// Record predicate applied before any aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecordFilter {
    /// Field text contains one of the keywords, ignoring case
    Contains { field: String, keywords: Vec<String> },
    /// Field holds a truthy win/result style value
    Flag { field: String },
}

impl RecordFilter {
    pub fn matches(&self, record: &DatasetRecord) -> bool {
        match self {
            RecordFilter::Contains { field, keywords } => match field_text(record, field) {
                Some(text) => {
                    let text = text.to_lowercase();
                    keywords.iter().any(|keyword| text.contains(&keyword.to_lowercase()))
                }
                None => false,
            },
            RecordFilter::Flag { field } => field_flag(record, field),
        }
    }
}

/// Mapping from dataset fields to visual channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Category axis, slice label, or scatter x
    pub label: String,
    /// Numeric field for sum/mean and scatter y
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub aggregate: Aggregate,
    /// Splits records into one colored series per distinct value
    #[serde(default)]
    pub series: Option<String>,
    /// Scatter only: one point per distinct label, x = records in the group
    #[serde(default)]
    pub grouped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub mapping: FieldMapping,
    /// Keep only the N largest labels (by aggregated value)
    #[serde(default)]
    pub limit: Option<usize>,
    /// Records must pass every filter to be plotted
    #[serde(default)]
    pub filters: Vec<RecordFilter>,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, title: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            mapping: FieldMapping {
                label: label.into(),
                value: None,
                aggregate: Aggregate::Count,
                series: None,
                grouped: false,
            },
            limit: None,
            filters: Vec::new(),
        }
    }

    pub fn value(mut self, field: impl Into<String>, aggregate: Aggregate) -> Self {
        self.mapping.value = Some(field.into());
        self.mapping.aggregate = aggregate;
        self
    }

    pub fn series(mut self, field: impl Into<String>) -> Self {
        self.mapping.series = Some(field.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn grouped(mut self) -> Self {
        self.mapping.grouped = true;
        self
    }

    /// Keep records whose `field` contains any of `keywords`
    pub fn where_contains(mut self, field: impl Into<String>, keywords: &[&str]) -> Self {
        self.filters.push(RecordFilter::Contains {
            field: field.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        });
        self
    }

    /// Keep records whose `field` is truthy
    pub fn where_flag(mut self, field: impl Into<String>) -> Self {
        self.filters.push(RecordFilter::Flag { field: field.into() });
        self
    }

    pub fn accepts(&self, record: &DatasetRecord) -> bool {
        self.filters.iter().all(|filter| filter.matches(record))
    }
}
