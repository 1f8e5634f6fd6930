// Chart Payload
// Pre-aggregated summary of the normalized dataset for the analytics charts

use std::collections::{BTreeMap, HashMap};

use crate::models::{
    field_flag, field_number, field_text, ChartPayload, DatasetRecord, EfficiencyPoint,
    LabeledCounts, PayloadMeta, ScatterPayload,
};

const UNKNOWN: &str = "Unknown";
const NO_DATA: &str = "No Data";
const WIN_EFFICIENCY_LABEL: &str = "Win Efficiency";

/// Category keywords of the four general-field awards
pub const BIG4_KEYWORDS: &[&str] = &[
    "record of the year",
    "album of the year",
    "song of the year",
    "best new artist",
];
pub const BIG4_LIMIT: usize = 12;

pub fn build_payload(records: &[DatasetRecord], columns: &[String]) -> ChartPayload {
    let years: Vec<i64> = records
        .iter()
        .filter_map(|record| field_number(record, "year"))
        .map(|year| year as i64)
        .collect();

    let year_range = match (years.iter().min(), years.iter().max()) {
        (Some(min), Some(max)) => Some(format!("{min}-{max}")),
        _ => None,
    };

    ChartPayload {
        polar: category_counts(records),
        evolution: nominations_per_year(&years),
        scatter: ScatterPayload::single(WIN_EFFICIENCY_LABEL, win_efficiency(records)),
        big4: big4_wins(records),
        meta: PayloadMeta {
            rows: records.len(),
            columns: columns.to_vec(),
            year_range,
        },
    }
}

/// Nominations per category, most frequent first
fn category_counts(records: &[DatasetRecord]) -> LabeledCounts {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        let category = field_text(record, "category").unwrap_or_else(|| UNKNOWN.to_string());
        *counts.entry(category).or_default() += 1;
    }
    into_ranked(counts, None)
}

fn nominations_per_year(years: &[i64]) -> LabeledCounts {
    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for year in years {
        *counts.entry(*year).or_default() += 1;
    }
    LabeledCounts {
        labels: counts.keys().map(i64::to_string).collect(),
        data: counts.values().copied().collect(),
    }
}

/// One bubble per artist: nominations against win percentage
fn win_efficiency(records: &[DatasetRecord]) -> Vec<EfficiencyPoint> {
    let mut stats: HashMap<String, (u64, u64)> = HashMap::new();
    for record in records {
        let artist = field_text(record, "artist").unwrap_or_else(|| UNKNOWN.to_string());
        let entry = stats.entry(artist).or_default();
        entry.0 += 1;
        if field_flag(record, "winner") {
            entry.1 += 1;
        }
    }

    let mut points: Vec<EfficiencyPoint> = stats
        .into_iter()
        .map(|(artist, (nominations, wins))| {
            let efficiency = wins as f64 / nominations as f64 * 100.0;
            EfficiencyPoint {
                artist,
                x: nominations.max(1),
                y: (efficiency * 100.0).round() / 100.0,
                r: (wins * 4).clamp(4, 40),
            }
        })
        .collect();
    points.sort_by(|a, b| b.x.cmp(&a.x).then_with(|| a.artist.cmp(&b.artist)));
    points
}

/// Wins per artist in the four general-field categories
fn big4_wins(records: &[DatasetRecord]) -> LabeledCounts {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        let Some(category) = field_text(record, "category") else {
            continue;
        };
        let category = category.to_lowercase();
        if !BIG4_KEYWORDS.iter().any(|keyword| category.contains(keyword)) {
            continue;
        }
        if field_flag(record, "winner") {
            let artist = field_text(record, "artist").unwrap_or_else(|| UNKNOWN.to_string());
            *counts.entry(artist).or_default() += 1;
        }
    }

    if counts.is_empty() {
        return LabeledCounts {
            labels: vec![NO_DATA.to_string()],
            data: vec![0],
        };
    }
    into_ranked(counts, Some(BIG4_LIMIT))
}

fn into_ranked(counts: HashMap<String, u64>, limit: Option<usize>) -> LabeledCounts {
    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    let (labels, data) = ranked.into_iter().unzip();
    LabeledCounts { labels, data }
}
