// Chart Payload Model
// Chart-friendly summary served at /api/<dataset>/summary

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabeledCounts {
    pub labels: Vec<String>,
    pub data: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyPoint {
    pub artist: String,
    /// Nominations (at least 1)
    pub x: u64,
    /// Win percentage, two decimals
    pub y: f64,
    /// Bubble radius, 4..=40
    pub r: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyDataset {
    pub label: String,
    pub data: Vec<EfficiencyPoint>,
}

/// Chart.js-style wrapper: `{"datasets": [{"label": .., "data": [..]}]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScatterPayload {
    pub datasets: Vec<EfficiencyDataset>,
}

impl ScatterPayload {
    pub fn single(label: impl Into<String>, data: Vec<EfficiencyPoint>) -> Self {
        Self {
            datasets: vec![EfficiencyDataset {
                label: label.into(),
                data,
            }],
        }
    }

    /// Every point across datasets
    pub fn points(&self) -> impl Iterator<Item = &EfficiencyPoint> {
        self.datasets.iter().flat_map(|dataset| dataset.data.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    pub rows: usize,
    pub columns: Vec<String>,
    pub year_range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartPayload {
    pub polar: LabeledCounts,
    pub evolution: LabeledCounts,
    pub scatter: ScatterPayload,
    pub big4: LabeledCounts,
    pub meta: PayloadMeta,
}
