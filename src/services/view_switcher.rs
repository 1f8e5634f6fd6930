// ViewSwitcher Service
// Exactly one panel visible at a time; not persisted

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::models::PanelId;

use super::EventSink;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ViewError {
    #[error("Unknown panel '{0}'")]
    UnknownPanel(String),
}

pub struct ViewSwitcher {
    active: PanelId,
    /// Bumped on every activation; lets async work detect that the view moved on
    epoch: u64,
    event_sink: Arc<dyn EventSink>,
}

impl ViewSwitcher {
    pub fn new(event_sink: Arc<dyn EventSink>) -> Self {
        Self {
            active: PanelId::default(),
            epoch: 0,
            event_sink,
        }
    }

    pub fn activate(&mut self, panel: PanelId) -> u64 {
        let previous = self.active;
        self.active = panel;
        self.epoch += 1;

        self.event_sink.emit(
            "panel_changed",
            json!({ "panel": panel.as_str(), "previous": previous.as_str() }),
        );
        self.epoch
    }

    /// Activate by string id; unknown ids leave the current panel untouched
    pub fn activate_by_id(&mut self, id: &str) -> Result<PanelId, ViewError> {
        let panel: PanelId = id.parse().map_err(|unknown: String| {
            log::warn!("Rejected activation of unknown panel '{unknown}'");
            ViewError::UnknownPanel(unknown)
        })?;
        self.activate(panel);
        Ok(panel)
    }

    pub fn current(&self) -> PanelId {
        self.active
    }

    pub fn is_active(&self, panel: PanelId) -> bool {
        self.active == panel
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
