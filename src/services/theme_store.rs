// ThemeStore Service
// Owns the persisted light/dark preference and its color token set

use std::sync::{Arc, RwLock};

use serde_json::json;

use crate::models::{ColorTokenSet, ThemePreference};

use super::{embedded_token_set, EventSink, PreferenceStorage};

/// Fixed storage key of the preference
pub const THEME_PREFERENCE_KEY: &str = "theme";

/// Notified synchronously after every preference change
pub trait ThemeObserver: Send + Sync {
    fn theme_changed(&self, preference: ThemePreference, tokens: &ColorTokenSet);
}

pub struct ThemeStore {
    storage: Arc<dyn PreferenceStorage>,
    current: ThemePreference,
    observers: RwLock<Vec<Arc<dyn ThemeObserver>>>,
    event_sink: Arc<dyn EventSink>,
}

impl ThemeStore {
    /// Resolve the stored preference once, before anything themed is drawn.
    /// Missing or unreadable values resolve to light.
    pub fn new(storage: Arc<dyn PreferenceStorage>, event_sink: Arc<dyn EventSink>) -> Self {
        let current = match storage.read(THEME_PREFERENCE_KEY) {
            Ok(Some(value)) => value.parse().unwrap_or_else(|e| {
                log::warn!("Ignoring stored theme preference: {e}");
                ThemePreference::default()
            }),
            Ok(None) => ThemePreference::default(),
            Err(e) => {
                log::warn!("Theme preference unavailable, using default: {e}");
                ThemePreference::default()
            }
        };
        log::info!("Theme preference resolved to '{current}'");

        Self {
            storage,
            current,
            observers: RwLock::new(Vec::new()),
            event_sink,
        }
    }

    pub fn get_preference(&self) -> ThemePreference {
        self.current
    }

    /// Apply `value` and notify subscribers. Persistence is best-effort: a
    /// failed write is logged and the new theme still takes effect.
    pub fn set_preference(&mut self, value: ThemePreference) {
        self.current = value;

        if let Err(e) = self.storage.write(THEME_PREFERENCE_KEY, value.as_str()) {
            log::warn!("Failed to persist theme preference '{value}': {e}");
        }

        let tokens = self.tokens();
        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(_) => Vec::new(),
        };
        for observer in observers {
            observer.theme_changed(value, tokens);
        }

        self.event_sink
            .emit("theme_changed", json!({ "theme": value.as_str() }));
    }

    pub fn toggle(&mut self) -> ThemePreference {
        let next = self.current.opposite();
        self.set_preference(next);
        next
    }

    pub fn tokens(&self) -> &'static ColorTokenSet {
        embedded_token_set(self.current)
    }

    pub fn subscribe(&self, observer: Arc<dyn ThemeObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }
}
