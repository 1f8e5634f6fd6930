// Panel Model
// Content sections of the course page

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Top-level content sections of the course page. Exactly one is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelId {
    /// CSV and JSON ingestion
    #[default]
    Ingestion,
    /// Array and vector operations
    Arrays,
    /// Tabular aggregation
    Aggregation,
    /// Data cleaning
    Cleaning,
    /// Narrative capstone
    Story,
    /// Analytics capstone (the only panel with live data)
    Analytics,
    /// References and further reading
    Resources,
}

impl PanelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelId::Ingestion => "ingestion",
            PanelId::Arrays => "arrays",
            PanelId::Aggregation => "aggregation",
            PanelId::Cleaning => "cleaning",
            PanelId::Story => "story",
            PanelId::Analytics => "analytics",
            PanelId::Resources => "resources",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PanelId::Ingestion => "CSV & JSON Ingestion",
            PanelId::Arrays => "Arrays & Vectors",
            PanelId::Aggregation => "Tabular Aggregation",
            PanelId::Cleaning => "Data Cleaning",
            PanelId::Story => "Capstone: The Story",
            PanelId::Analytics => "Capstone: Grammy Analytics",
            PanelId::Resources => "Resources",
        }
    }

    pub fn all() -> &'static [PanelId] {
        &[
            PanelId::Ingestion,
            PanelId::Arrays,
            PanelId::Aggregation,
            PanelId::Cleaning,
            PanelId::Story,
            PanelId::Analytics,
            PanelId::Resources,
        ]
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PanelId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim();
        PanelId::all()
            .iter()
            .copied()
            .find(|panel| panel.as_str() == needle)
            .ok_or_else(|| needle.to_string())
    }
}
