// Chart.js Backend
// Keeps one Chart.js configuration object per live chart instance. The page
// script mirrors these configs into `new Chart(...)` / `chart.update()` calls.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Value};

use crate::models::{ChartKind, ChartSpec};

use super::chart_renderer::{
    ChartBackend, ChartData, ChartId, ChartPalette, RETHEME_TRANSITION, PLACEHOLDER_LABEL,
    SeriesData,
};

#[derive(Debug, Clone)]
pub struct ChartInstance {
    pub region: String,
    pub kind: ChartKind,
    pub placeholder: bool,
    pub config: Value,
}

#[derive(Default)]
pub struct ChartJsBackend {
    next_id: ChartId,
    instances: HashMap<ChartId, ChartInstance>,
}

impl ChartJsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance(&self, id: ChartId) -> Option<&ChartInstance> {
        self.instances.get(&id)
    }

    /// Live instances bound to `region`
    pub fn instances_in(&self, region: &str) -> Vec<&ChartInstance> {
        self.instances
            .values()
            .filter(|instance| instance.region == region)
            .collect()
    }
}

impl ChartBackend for ChartJsBackend {
    fn create(
        &mut self,
        region: &str,
        spec: &ChartSpec,
        data: &ChartData,
        palette: &ChartPalette,
    ) -> ChartId {
        self.next_id += 1;
        let id = self.next_id;

        let placeholder = data.is_placeholder();
        let mut config = json!({
            "type": spec.kind.as_str(),
            "data": chart_data_json(spec.kind, data),
            "options": {
                "responsive": true,
                "maintainAspectRatio": false,
                "animation": { "duration": RETHEME_TRANSITION.as_millis() as u64 },
                "plugins": {
                    "title": { "display": true, "text": spec.title },
                    "legend": { "display": spec.kind != ChartKind::Scatter || data.series.len() > 1 },
                },
            },
        });
        apply_palette(&mut config, spec.kind, placeholder, palette);

        log::debug!("Created chart {id} ({}) in region '{region}'", spec.kind.as_str());
        self.instances.insert(
            id,
            ChartInstance {
                region: region.to_string(),
                kind: spec.kind,
                placeholder,
                config,
            },
        );
        id
    }

    fn destroy(&mut self, id: ChartId) {
        if self.instances.remove(&id).is_none() {
            log::debug!("Chart {id} already destroyed");
        }
    }

    fn restyle(&mut self, id: ChartId, palette: &ChartPalette, transition: Duration) {
        let Some(instance) = self.instances.get_mut(&id) else {
            log::warn!("Restyle requested for unknown chart {id}");
            return;
        };
        instance.config["options"]["animation"]["duration"] = json!(transition.as_millis() as u64);
        apply_palette(&mut instance.config, instance.kind, instance.placeholder, palette);
    }

    fn live_count(&self) -> usize {
        self.instances.len()
    }
}

fn chart_data_json(kind: ChartKind, data: &ChartData) -> Value {
    if data.is_placeholder() {
        let value = if kind.has_axes() { 0 } else { 1 };
        return json!({
            "labels": [PLACEHOLDER_LABEL],
            "datasets": [{ "label": PLACEHOLDER_LABEL, "data": [value] }],
        });
    }

    let datasets: Vec<Value> = data
        .series
        .iter()
        .map(|series| match &series.data {
            SeriesData::Values(values) => json!({ "label": series.name, "data": values }),
            SeriesData::Points(points) => json!({ "label": series.name, "data": points }),
        })
        .collect();

    json!({ "labels": data.labels, "datasets": datasets })
}

/// Write every color-dependent option. Dataset `data` arrays are never touched.
fn apply_palette(config: &mut Value, kind: ChartKind, placeholder: bool, palette: &ChartPalette) {
    let options = &mut config["options"];
    options["plugins"]["title"]["color"] = json!(palette.title);
    options["plugins"]["legend"]["labels"]["color"] = json!(palette.label);
    options["plugins"]["tooltip"]["backgroundColor"] = json!(palette.tooltip_background);
    options["plugins"]["tooltip"]["titleColor"] = json!(palette.tooltip_text);
    options["plugins"]["tooltip"]["bodyColor"] = json!(palette.tooltip_text);

    if kind.has_axes() {
        for axis in ["x", "y"] {
            options["scales"][axis]["grid"]["color"] = json!(palette.grid);
            options["scales"][axis]["ticks"]["color"] = json!(palette.label);
        }
    } else if kind.has_radial_scale() {
        options["scales"]["r"]["grid"]["color"] = json!(palette.grid);
        options["scales"]["r"]["angleLines"]["color"] = json!(palette.grid);
        options["scales"]["r"]["ticks"]["color"] = json!(palette.label);
        options["scales"]["r"]["ticks"]["backdropColor"] = json!("transparent");
    }

    let label_count = config_label_count(&config["data"]);
    let Some(datasets) = config["data"]["datasets"].as_array_mut() else {
        return;
    };
    let single_series_slices = !kind.has_axes() && datasets.len() == 1;

    for (index, dataset) in datasets.iter_mut().enumerate() {
        if placeholder {
            dataset["backgroundColor"] = json!(palette.placeholder);
            dataset["borderColor"] = json!(palette.placeholder);
        } else if single_series_slices {
            // Pie/doughnut/polar: one color per slice
            let colors: Vec<&str> = (0..label_count).map(|i| palette.series_color(i)).collect();
            dataset["backgroundColor"] = json!(colors);
            dataset["borderColor"] = json!(colors);
        } else {
            dataset["backgroundColor"] = json!(palette.series_color(index));
            dataset["borderColor"] = json!(palette.series_color(index));
        }
    }
}

fn config_label_count(data: &Value) -> usize {
    data["labels"].as_array().map(Vec::len).unwrap_or(0)
}
