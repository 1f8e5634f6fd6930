// Datalab Services
// Client engines (theme, panels, charts, datasets) and the dataset service

mod events;
mod preference_store;
mod embedded_themes;
mod theme_store;
mod view_switcher;
mod chart_renderer;
mod chartjs_backend;
mod dataset_provider;
mod dataset_source;
mod dataset_cache;
mod chart_payload;
mod data_service;
mod app_shell;
mod log_manager;

pub use events::*;
pub use preference_store::*;
pub use embedded_themes::{embedded_token_set, required_tokens, validate_token_set, ThemeError};
pub use theme_store::*;
pub use view_switcher::*;
pub use chart_renderer::*;
pub use chartjs_backend::*;
pub use dataset_provider::*;
pub use dataset_source::*;
pub use dataset_cache::*;
pub use chart_payload::*;
pub use data_service::*;
pub use app_shell::*;
pub use log_manager::*;

#[cfg(test)]
mod test_support;
