// App Shell
// Client-side coordinator: routes interactions to the theme store, view
// switcher, chart renderer and dataset provider in event order.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use crate::models::{
    Aggregate, ChartKind, ChartSpec, DataSource, DatasetRecord, PanelId, ResolvedDataset,
    ThemePreference,
};

use super::{
    ChartJsBackend, ChartRenderer, DatasetProvider, EventSink, FilePreferenceStorage,
    MemoryPreferenceStorage, PreferenceStorage, ThemeStore, ViewError, ViewSwitcher,
    BIG4_KEYWORDS, BIG4_LIMIT, DEFAULT_RESOLVE_TIMEOUT,
};

pub const ANALYTICS_POLAR: &str = "analytics-polar";
pub const ANALYTICS_EVOLUTION: &str = "analytics-evolution";
pub const ANALYTICS_SCATTER: &str = "analytics-scatter";
pub const ANALYTICS_BIG4: &str = "analytics-big4";

pub type SharedRenderer = Arc<Mutex<ChartRenderer<ChartJsBackend>>>;

/// Outstanding dataset load for the analytics panel. Only the ticket of the
/// most recent activation can be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingLoad {
    epoch: u64,
}

impl PendingLoad {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Charts drawn in the analytics panel, keyed by display region
pub fn analytics_charts() -> Vec<(&'static str, ChartSpec)> {
    vec![
        (
            ANALYTICS_POLAR,
            ChartSpec::new(ChartKind::PolarArea, "Nominations by Category", "category").limit(8),
        ),
        (
            ANALYTICS_EVOLUTION,
            ChartSpec::new(ChartKind::Line, "Nominations per Year", "year"),
        ),
        (
            ANALYTICS_SCATTER,
            // x = nominations, y = win percentage, one point per artist
            ChartSpec::new(ChartKind::Scatter, "Win Efficiency", "artist")
                .value("winner", Aggregate::Rate)
                .grouped(),
        ),
        (
            ANALYTICS_BIG4,
            ChartSpec::new(ChartKind::Doughnut, "Big Four Wins by Artist", "artist")
                .where_contains("category", BIG4_KEYWORDS)
                .where_flag("winner")
                .limit(BIG4_LIMIT),
        ),
    ]
}

pub struct AppShell {
    theme: ThemeStore,
    views: ViewSwitcher,
    renderer: SharedRenderer,
    provider: DatasetProvider,
    resolve_timeout: Duration,
    dataset: Option<ResolvedDataset>,
    event_sink: Arc<dyn EventSink>,
}

impl AppShell {
    pub fn new(
        storage: Arc<dyn PreferenceStorage>,
        provider: DatasetProvider,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        // Theme resolves before any chart exists
        let theme = ThemeStore::new(storage, event_sink.clone());
        let renderer: SharedRenderer = Arc::new(Mutex::new(ChartRenderer::new(
            ChartJsBackend::new(),
            theme.tokens(),
        )));
        theme.subscribe(renderer.clone());

        Self {
            theme,
            views: ViewSwitcher::new(event_sink.clone()),
            renderer,
            provider,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            dataset: None,
            event_sink,
        }
    }

    /// Shell persisting its preference under the platform config directory.
    /// Without one the preference lasts for the session only.
    pub fn with_default_storage(provider: DatasetProvider, event_sink: Arc<dyn EventSink>) -> Self {
        let storage: Arc<dyn PreferenceStorage> = match FilePreferenceStorage::in_config_dir() {
            Some(storage) => {
                log::debug!("Preferences stored at {:?}", storage.path());
                Arc::new(storage)
            }
            None => {
                log::warn!("No config directory available, theme preference will not persist");
                Arc::new(MemoryPreferenceStorage::new())
            }
        };
        Self::new(storage, provider, event_sink)
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Show `panel`. The first visit to analytics draws placeholders and
    /// returns a ticket for the dataset load; later visits reuse the data.
    pub fn activate(&mut self, panel: PanelId) -> Option<PendingLoad> {
        self.views.activate(panel);
        self.after_activation(panel)
    }

    pub fn activate_by_id(&mut self, id: &str) -> Result<Option<PendingLoad>, ViewError> {
        let panel = self.views.activate_by_id(id)?;
        Ok(self.after_activation(panel))
    }

    /// Apply a resolved dataset if `ticket` is still current. Responses that
    /// arrive after the user moved on are dropped.
    pub fn complete_load(&mut self, ticket: PendingLoad, resolved: ResolvedDataset) -> bool {
        if ticket.epoch != self.views.epoch() || !self.views.is_active(PanelId::Analytics) {
            log::debug!(
                "Discarding late dataset (ticket {}, current {})",
                ticket.epoch,
                self.views.epoch()
            );
            return false;
        }

        if resolved.is_fallback() {
            log::info!("Analytics showing embedded sample data");
        }
        self.render_analytics(&resolved.records);
        self.event_sink.emit(
            "dataset_resolved",
            json!({ "source": resolved.source.as_str(), "records": resolved.records.len() }),
        );
        self.dataset = Some(resolved);
        true
    }

    /// Activate analytics and load its dataset in one step
    pub async fn open_analytics(&mut self) -> bool {
        let Some(ticket) = self.activate(PanelId::Analytics) else {
            return true;
        };
        let resolved = self.provider.resolve(self.resolve_timeout).await;
        self.complete_load(ticket, resolved)
    }

    pub fn toggle_theme(&mut self) -> ThemePreference {
        self.theme.toggle()
    }

    pub fn theme(&self) -> &ThemeStore {
        &self.theme
    }

    pub fn current_panel(&self) -> PanelId {
        self.views.current()
    }

    /// Navigation entries: id, label and whether the panel is showing
    pub fn panels(&self) -> Vec<(PanelId, &'static str, bool)> {
        PanelId::all()
            .iter()
            .map(|panel| (*panel, panel.display_name(), self.views.is_active(*panel)))
            .collect()
    }

    /// Page-level custom properties for the active theme
    pub fn theme_css(&self) -> String {
        self.theme.tokens().to_css(":root")
    }

    pub fn renderer(&self) -> SharedRenderer {
        self.renderer.clone()
    }

    /// Freshness of the dataset on screen, once one has been applied
    pub fn data_source(&self) -> Option<DataSource> {
        self.dataset.as_ref().map(|dataset| dataset.source)
    }

    fn after_activation(&mut self, panel: PanelId) -> Option<PendingLoad> {
        if panel != PanelId::Analytics {
            return None;
        }

        if let Some(dataset) = &self.dataset {
            self.render_analytics(&dataset.records);
            return None;
        }

        self.render_analytics(&[]);
        Some(PendingLoad {
            epoch: self.views.epoch(),
        })
    }

    fn render_analytics(&self, records: &[DatasetRecord]) {
        let mut renderer = match self.renderer.lock() {
            Ok(renderer) => renderer,
            Err(_) => {
                log::warn!("Chart renderer lock poisoned, skipping analytics render");
                return;
            }
        };
        for (region, spec) in analytics_charts() {
            if let Err(e) = renderer.render(region, &spec, records) {
                log::error!("Failed to render chart in '{region}': {e}");
            }
        }
    }
}
