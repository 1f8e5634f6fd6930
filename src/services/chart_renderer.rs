// Chart Renderer
// Single choke point for chart instance lifecycle: at most one live chart per
// display region, re-themed in place when the theme changes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::models::{
    field_flag, field_number, field_text, Aggregate, ChartKind, ChartSpec, ColorTokenSet,
    DatasetRecord, ThemePreference,
};

use super::theme_store::ThemeObserver;

/// Theme tokens read by the renderer. Both theme files must define them.
pub const CHART_TOKENS: &[&str] = &[
    "grid-line",
    "chart-label",
    "chart-title",
    "tooltip-background",
    "tooltip-text",
    "placeholder",
    "series-1",
    "series-2",
    "series-3",
    "series-4",
    "series-5",
    "series-6",
];

const SERIES_TOKEN_COUNT: usize = 6;

/// Duration of the color transition applied on re-theme
pub const RETHEME_TRANSITION: Duration = Duration::from_millis(300);

pub const PLACEHOLDER_LABEL: &str = "No data";

const FALLBACK_COLOR: &str = "#808080";
const UNKNOWN_SERIES: &str = "Unknown";

pub type ChartId = u64;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RenderError {
    #[error("Display region id cannot be empty")]
    InvalidRegion,

    #[error("Invalid chart spec '{title}': {reason}")]
    InvalidSpec { title: String, reason: String },
}

/// Concrete colors for chart chrome and series, resolved from a token set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPalette {
    pub grid: String,
    pub label: String,
    pub title: String,
    pub tooltip_background: String,
    pub tooltip_text: String,
    pub placeholder: String,
    pub series: Vec<String>,
}

impl ChartPalette {
    pub fn from_tokens(tokens: &ColorTokenSet) -> Self {
        let token = |name: &str| match tokens.get(name) {
            Some(value) => value.to_string(),
            None => {
                log::warn!("Theme token '{name}' undefined, using neutral color");
                FALLBACK_COLOR.to_string()
            }
        };

        Self {
            grid: token("grid-line"),
            label: token("chart-label"),
            title: token("chart-title"),
            tooltip_background: token("tooltip-background"),
            tooltip_text: token("tooltip-text"),
            placeholder: token("placeholder"),
            series: (1..=SERIES_TOKEN_COUNT)
                .map(|i| token(&format!("series-{i}")))
                .collect(),
        }
    }

    pub fn series_color(&self, index: usize) -> &str {
        if self.series.is_empty() {
            return FALLBACK_COLOR;
        }
        &self.series[index % self.series.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    /// Group the point stands for (grouped scatter only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesData {
    Values(Vec<f64>),
    Points(Vec<ScatterPoint>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub data: SeriesData,
}

/// Plot-ready data extracted from records according to a spec
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

impl ChartData {
    pub fn placeholder() -> Self {
        Self {
            labels: Vec::new(),
            series: Vec::new(),
        }
    }

    /// Nothing plottable was found
    pub fn is_placeholder(&self) -> bool {
        self.series.is_empty()
    }
}

/// The charting library seam. Implementations own the library's instances.
pub trait ChartBackend: Send {
    fn create(
        &mut self,
        region: &str,
        spec: &ChartSpec,
        data: &ChartData,
        palette: &ChartPalette,
    ) -> ChartId;

    fn destroy(&mut self, id: ChartId);

    /// Update colors of a live chart in place, animating over `transition`
    fn restyle(&mut self, id: ChartId, palette: &ChartPalette, transition: Duration);

    fn live_count(&self) -> usize;
}

pub struct ChartRenderer<B: ChartBackend> {
    backend: B,
    live: BTreeMap<String, ChartId>,
    palette: ChartPalette,
}

impl<B: ChartBackend> ChartRenderer<B> {
    pub fn new(backend: B, tokens: &ColorTokenSet) -> Self {
        Self {
            backend,
            live: BTreeMap::new(),
            palette: ChartPalette::from_tokens(tokens),
        }
    }

    /// Create or replace the chart bound to `region`. Malformed or empty
    /// records produce a placeholder chart, never an error.
    pub fn render(
        &mut self,
        region: &str,
        spec: &ChartSpec,
        records: &[DatasetRecord],
    ) -> Result<ChartId, RenderError> {
        let region = region.trim();
        if region.is_empty() {
            return Err(RenderError::InvalidRegion);
        }
        validate_spec(spec)?;

        if let Some(previous) = self.live.remove(region) {
            self.backend.destroy(previous);
        }

        let data = build_chart_data(spec, records);
        if data.is_placeholder() {
            log::debug!("Rendering placeholder for region '{region}' ({})", spec.title);
        }

        let id = self.backend.create(region, spec, &data, &self.palette);
        self.live.insert(region.to_string(), id);
        Ok(id)
    }

    /// Apply a new token set to every live chart without recreating it
    pub fn retheme(&mut self, tokens: &ColorTokenSet) {
        self.palette = ChartPalette::from_tokens(tokens);
        for id in self.live.values() {
            self.backend.restyle(*id, &self.palette, RETHEME_TRANSITION);
        }
        log::debug!("Re-themed {} live chart(s)", self.live.len());
    }

    pub fn destroy(&mut self, region: &str) -> bool {
        match self.live.remove(region) {
            Some(id) => {
                self.backend.destroy(id);
                true
            }
            None => false,
        }
    }

    /// Destroy every live chart
    pub fn clear(&mut self) {
        for (_, id) in std::mem::take(&mut self.live) {
            self.backend.destroy(id);
        }
    }

    pub fn chart_id(&self, region: &str) -> Option<ChartId> {
        self.live.get(region).copied()
    }

    pub fn live_regions(&self) -> Vec<&str> {
        self.live.keys().map(String::as_str).collect()
    }

    pub fn palette(&self) -> &ChartPalette {
        &self.palette
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: ChartBackend> ThemeObserver for Mutex<ChartRenderer<B>> {
    fn theme_changed(&self, _preference: ThemePreference, tokens: &ColorTokenSet) {
        match self.lock() {
            Ok(mut renderer) => renderer.retheme(tokens),
            Err(_) => log::warn!("Chart renderer lock poisoned, skipping re-theme"),
        }
    }
}

fn validate_spec(spec: &ChartSpec) -> Result<(), RenderError> {
    let invalid = |reason: &str| RenderError::InvalidSpec {
        title: spec.title.clone(),
        reason: reason.to_string(),
    };

    if spec.mapping.label.trim().is_empty() {
        return Err(invalid("label field is required"));
    }
    let has_value = spec
        .mapping
        .value
        .as_deref()
        .map(|field| !field.trim().is_empty())
        .unwrap_or(false);
    if spec.kind == ChartKind::Scatter && !has_value {
        return Err(invalid("scatter charts need a value field for y"));
    }
    if spec.mapping.aggregate != Aggregate::Count && !has_value {
        return Err(invalid("sum, mean and rate need a value field"));
    }
    if spec.limit == Some(0) {
        return Err(invalid("limit must be positive"));
    }
    Ok(())
}

/// Extract plot data from records. Records missing the mapped fields are
/// skipped; when nothing remains the result is a placeholder.
pub fn build_chart_data(spec: &ChartSpec, records: &[DatasetRecord]) -> ChartData {
    let records: Vec<&DatasetRecord> = records.iter().filter(|record| spec.accepts(record)).collect();
    if spec.kind == ChartKind::Scatter {
        return if spec.mapping.grouped {
            build_grouped_scatter(spec, &records)
        } else {
            build_scatter(spec, &records)
        };
    }

    let mapping = &spec.mapping;
    // series -> label -> (sum, count)
    let mut cells: BTreeMap<String, HashMap<String, (f64, u64)>> = BTreeMap::new();
    let mut totals: HashMap<String, f64> = HashMap::new();

    for record in records {
        let Some(label) = field_text(record, &mapping.label) else {
            continue;
        };
        let value = match mapping.aggregate {
            Aggregate::Count => 1.0,
            Aggregate::Sum | Aggregate::Mean | Aggregate::Rate => {
                match mapping.value.as_deref().and_then(|field| field_number(record, field)) {
                    Some(value) => value,
                    None => continue,
                }
            }
        };
        let series = match mapping.series.as_deref() {
            Some(field) => field_text(record, field).unwrap_or_else(|| UNKNOWN_SERIES.to_string()),
            None => spec.title.clone(),
        };

        let cell = cells.entry(series).or_default().entry(label.clone()).or_insert((0.0, 0));
        cell.0 += value;
        cell.1 += 1;
        *totals.entry(label).or_insert(0.0) += value;
    }

    if totals.is_empty() {
        return ChartData::placeholder();
    }

    let mut labels: Vec<String> = totals.keys().cloned().collect();
    labels.sort_by(|a, b| {
        totals[b]
            .partial_cmp(&totals[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(b))
    });
    if let Some(limit) = spec.limit {
        labels.truncate(limit);
    }
    // Numeric labels (years) read left to right
    let numeric: Option<Vec<f64>> = labels.iter().map(|l| l.parse::<f64>().ok()).collect();
    if numeric.is_some() {
        labels.sort_by(|a, b| {
            let a = a.parse::<f64>().unwrap_or(0.0);
            let b = b.parse::<f64>().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let series = cells
        .into_iter()
        .map(|(name, by_label)| {
            let values = labels
                .iter()
                .map(|label| match by_label.get(label) {
                    Some((sum, count)) => combine(mapping.aggregate, *sum, *count),
                    None => 0.0,
                })
                .collect();
            Series {
                name,
                data: SeriesData::Values(values),
            }
        })
        .collect();

    ChartData { labels, series }
}

fn combine(aggregate: Aggregate, sum: f64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    match aggregate {
        Aggregate::Count | Aggregate::Sum => sum,
        Aggregate::Mean => sum / count as f64,
        Aggregate::Rate => (sum / count as f64 * 100.0 * 100.0).round() / 100.0,
    }
}

fn build_scatter(spec: &ChartSpec, records: &[&DatasetRecord]) -> ChartData {
    let mapping = &spec.mapping;
    let Some(y_field) = mapping.value.as_deref() else {
        return ChartData::placeholder();
    };

    let mut by_series: BTreeMap<String, Vec<ScatterPoint>> = BTreeMap::new();
    for record in records {
        let (Some(x), Some(y)) = (field_number(record, &mapping.label), field_number(record, y_field))
        else {
            continue;
        };
        let series = match mapping.series.as_deref() {
            Some(field) => field_text(record, field).unwrap_or_else(|| UNKNOWN_SERIES.to_string()),
            None => spec.title.clone(),
        };
        by_series
            .entry(series)
            .or_default()
            .push(ScatterPoint { x, y, label: None });
    }

    if by_series.is_empty() {
        return ChartData::placeholder();
    }

    let series = by_series
        .into_iter()
        .map(|(name, mut points)| {
            if let Some(limit) = spec.limit {
                points.truncate(limit);
            }
            Series {
                name,
                data: SeriesData::Points(points),
            }
        })
        .collect();

    ChartData {
        labels: Vec::new(),
        series,
    }
}

/// One point per distinct label: x counts the label's records, y aggregates
/// the value field over them. Flag-style values count as 1/0.
fn build_grouped_scatter(spec: &ChartSpec, records: &[&DatasetRecord]) -> ChartData {
    let mapping = &spec.mapping;
    let Some(y_field) = mapping.value.as_deref() else {
        return ChartData::placeholder();
    };

    // series -> label -> (sum, count)
    let mut groups: BTreeMap<String, HashMap<String, (f64, u64)>> = BTreeMap::new();
    for record in records {
        let label = field_text(record, &mapping.label).unwrap_or_else(|| UNKNOWN_SERIES.to_string());
        let series = match mapping.series.as_deref() {
            Some(field) => field_text(record, field).unwrap_or_else(|| UNKNOWN_SERIES.to_string()),
            None => spec.title.clone(),
        };
        let value = field_number(record, y_field)
            .unwrap_or_else(|| if field_flag(record, y_field) { 1.0 } else { 0.0 });

        let group = groups.entry(series).or_default().entry(label).or_insert((0.0, 0));
        group.0 += value;
        group.1 += 1;
    }

    if groups.is_empty() {
        return ChartData::placeholder();
    }

    let series = groups
        .into_iter()
        .map(|(name, by_label)| {
            let mut points: Vec<ScatterPoint> = by_label
                .into_iter()
                .map(|(label, (sum, count))| ScatterPoint {
                    x: count as f64,
                    y: match mapping.aggregate {
                        Aggregate::Count => count as f64,
                        aggregate => combine(aggregate, sum, count),
                    },
                    label: Some(label),
                })
                .collect();
            points.sort_by(|a, b| {
                b.x.partial_cmp(&a.x)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.label.cmp(&b.label))
            });
            if let Some(limit) = spec.limit {
                points.truncate(limit);
            }
            Series {
                name,
                data: SeriesData::Points(points),
            }
        })
        .collect();

    ChartData {
        labels: Vec::new(),
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedded_token_set;
    use serde_json::{json, Value};

    /// Backend that only tracks instance bookkeeping
    #[derive(Default)]
    struct CountingBackend {
        next: ChartId,
        live: Vec<ChartId>,
        destroyed: Vec<ChartId>,
        restyled: Vec<(ChartId, Duration, String)>,
    }

    impl ChartBackend for CountingBackend {
        fn create(&mut self, _region: &str, _spec: &ChartSpec, _data: &ChartData, _palette: &ChartPalette) -> ChartId {
            self.next += 1;
            self.live.push(self.next);
            self.next
        }

        fn destroy(&mut self, id: ChartId) {
            self.live.retain(|live| *live != id);
            self.destroyed.push(id);
        }

        fn restyle(&mut self, id: ChartId, palette: &ChartPalette, transition: Duration) {
            self.restyled.push((id, transition, palette.grid.clone()));
        }

        fn live_count(&self) -> usize {
            self.live.len()
        }
    }

    fn records(value: Value) -> Vec<DatasetRecord> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn renderer() -> ChartRenderer<CountingBackend> {
        ChartRenderer::new(CountingBackend::default(), embedded_token_set(ThemePreference::Light))
    }

    #[test]
    fn test_render_twice_leaves_one_live_chart_per_region() {
        let mut renderer = renderer();
        let spec = ChartSpec::new(ChartKind::Bar, "By category", "category");
        let data = records(json!([{ "category": "Rock" }]));

        let first = renderer.render("region-a", &spec, &data).unwrap();
        let second = renderer.render("region-a", &spec, &data).unwrap();

        assert_ne!(first, second);
        assert_eq!(renderer.backend().live_count(), 1);
        assert_eq!(renderer.backend().destroyed, vec![first]);
        assert_eq!(renderer.chart_id("region-a"), Some(second));
    }

    #[test]
    fn test_regions_are_independent() {
        let mut renderer = renderer();
        let spec = ChartSpec::new(ChartKind::Pie, "Pie", "category");
        renderer.render("a", &spec, &[]).unwrap();
        renderer.render("b", &spec, &[]).unwrap();
        renderer.render("a", &spec, &[]).unwrap();
        assert_eq!(renderer.backend().live_count(), 2);
        assert_eq!(renderer.live_regions(), vec!["a", "b"]);

        assert!(renderer.destroy("a"));
        assert!(!renderer.destroy("a"));
        assert_eq!(renderer.backend().live_count(), 1);
        assert_eq!(renderer.live_regions(), vec!["b"]);

        renderer.clear();
        assert_eq!(renderer.backend().live_count(), 0);
        assert!(renderer.live_regions().is_empty());
    }

    #[test]
    fn test_invalid_requests_are_rejected_without_touching_live_charts() {
        let mut renderer = renderer();
        let spec = ChartSpec::new(ChartKind::Bar, "Bar", "category");
        renderer.render("a", &spec, &[]).unwrap();

        assert_eq!(renderer.render("  ", &spec, &[]), Err(RenderError::InvalidRegion));
        let bad = ChartSpec::new(ChartKind::Scatter, "Scatter", "x");
        assert!(matches!(renderer.render("a", &bad, &[]), Err(RenderError::InvalidSpec { .. })));
        let bad_sum = ChartSpec::new(ChartKind::Bar, "Sum", "category").value("", Aggregate::Sum);
        assert!(renderer.render("a", &bad_sum, &[]).is_err());

        assert_eq!(renderer.backend().live_count(), 1);
        assert!(renderer.backend().destroyed.is_empty());
    }

    #[test]
    fn test_retheme_restyles_every_live_chart_with_bounded_transition() {
        let mut renderer = renderer();
        let spec = ChartSpec::new(ChartKind::Line, "Line", "year");
        renderer.render("a", &spec, &[]).unwrap();
        renderer.render("b", &spec, &[]).unwrap();

        let dark = embedded_token_set(ThemePreference::Dark);
        renderer.retheme(dark);

        let restyled = &renderer.backend().restyled;
        assert_eq!(restyled.len(), 2);
        for (_, transition, grid) in restyled {
            assert!(*transition < Duration::from_millis(500));
            assert_eq!(grid, dark.get("grid-line").unwrap());
        }
        // Nothing was recreated
        assert!(renderer.backend().destroyed.is_empty());
    }

    #[test]
    fn test_palette_tolerates_missing_tokens() {
        let palette = ChartPalette::from_tokens(&ColorTokenSet::default());
        assert_eq!(palette.grid, FALLBACK_COLOR);
        assert_eq!(palette.series.len(), SERIES_TOKEN_COUNT);
    }

    #[test]
    fn test_count_aggregation_orders_by_total_and_limits() {
        let spec = ChartSpec::new(ChartKind::PolarArea, "Categories", "category").limit(2);
        let data = build_chart_data(
            &spec,
            &records(json!([
                { "category": "Pop" },
                { "category": "Rock" },
                { "category": "Rock" },
                { "category": "Jazz" },
                { "category": "Rock" },
                { "category": "Pop" },
            ])),
        );
        assert_eq!(data.labels, vec!["Rock", "Pop"]);
        assert_eq!(data.series[0].data, SeriesData::Values(vec![3.0, 2.0]));
    }

    #[test]
    fn test_numeric_labels_sorted_and_series_split() {
        let spec = ChartSpec::new(ChartKind::Line, "Per year", "year").series("winner");
        let data = build_chart_data(
            &spec,
            &records(json!([
                { "year": 2001, "winner": true },
                { "year": 1999, "winner": false },
                { "year": 2001, "winner": false },
            ])),
        );
        assert_eq!(data.labels, vec!["1999", "2001"]);
        assert_eq!(data.series.len(), 2);
        assert_eq!(data.series[0].name, "false");
        assert_eq!(data.series[0].data, SeriesData::Values(vec![1.0, 1.0]));
        assert_eq!(data.series[1].data, SeriesData::Values(vec![0.0, 1.0]));
    }

    #[test]
    fn test_mean_skips_non_numeric_values() {
        let spec = ChartSpec::new(ChartKind::Bar, "Mean", "artist").value("score", Aggregate::Mean);
        let data = build_chart_data(
            &spec,
            &records(json!([
                { "artist": "A", "score": 2 },
                { "artist": "A", "score": "4" },
                { "artist": "A", "score": "n/a" },
            ])),
        );
        assert_eq!(data.series[0].data, SeriesData::Values(vec![3.0]));
    }

    #[test]
    fn test_malformed_records_produce_placeholder() {
        let spec = ChartSpec::new(ChartKind::Bar, "Bar", "category");
        let data = build_chart_data(
            &spec,
            &records(json!([{ "category": { "nested": true } }, { "other": 1 }, {}])),
        );
        assert!(data.is_placeholder());
        assert!(build_chart_data(&spec, &[]).is_placeholder());
    }

    #[test]
    fn test_scatter_points() {
        let spec = ChartSpec::new(ChartKind::Scatter, "Efficiency", "noms").value("pct", Aggregate::Count);
        let data = build_chart_data(
            &spec,
            &records(json!([{ "noms": 4, "pct": 50.0 }, { "noms": "x", "pct": 1 }])),
        );
        assert_eq!(
            data.series[0].data,
            SeriesData::Points(vec![ScatterPoint { x: 4.0, y: 50.0, label: None }])
        );
    }

    #[test]
    fn test_filters_drop_records_before_counting() {
        let spec = ChartSpec::new(ChartKind::Doughnut, "Wins", "artist")
            .where_contains("category", &["album of the year"])
            .where_flag("winner");
        let data = build_chart_data(
            &spec,
            &records(json!([
                { "artist": "Adele", "category": "Album Of The Year", "winner": true },
                { "artist": "Adele", "category": "Best Pop Solo", "winner": true },
                { "artist": "Beck", "category": "Album Of The Year", "winner": false },
            ])),
        );
        assert_eq!(data.labels, vec!["Adele"]);
        assert_eq!(data.series[0].data, SeriesData::Values(vec![1.0]));
    }

    #[test]
    fn test_rate_is_percentage_with_two_decimals() {
        let spec = ChartSpec::new(ChartKind::Bar, "Rate", "artist").value("winner", Aggregate::Rate);
        let data = build_chart_data(
            &spec,
            &records(json!([
                { "artist": "A", "winner": true },
                { "artist": "A", "winner": false },
                { "artist": "A", "winner": false },
            ])),
        );
        assert_eq!(data.series[0].data, SeriesData::Values(vec![33.33]));
    }

    #[test]
    fn test_grouped_scatter_one_point_per_label() {
        let spec = ChartSpec::new(ChartKind::Scatter, "Efficiency", "artist")
            .value("winner", Aggregate::Rate)
            .grouped();
        let data = build_chart_data(
            &spec,
            &records(json!([
                { "artist": "Lizzo", "winner": false },
                { "artist": "Adele", "winner": true },
                { "artist": "Adele", "winner": "Winner" },
                { "winner": true },
            ])),
        );
        assert_eq!(
            data.series[0].data,
            SeriesData::Points(vec![
                ScatterPoint { x: 2.0, y: 100.0, label: Some("Adele".to_string()) },
                ScatterPoint { x: 1.0, y: 0.0, label: Some("Lizzo".to_string()) },
                ScatterPoint { x: 1.0, y: 100.0, label: Some("Unknown".to_string()) },
            ])
        );
    }
}
