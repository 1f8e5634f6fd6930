// Datalab Models
// Data structures shared by the client engines and the dataset service

mod theme;
mod panel;
mod dataset;
mod chart;
mod payload;
mod config;

pub use theme::*;
pub use panel::*;
pub use dataset::*;
pub use chart::*;
pub use payload::*;
pub use config::*;
