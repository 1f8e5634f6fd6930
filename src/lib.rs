// Datalab - Core Library
// Theme, panel, chart and dataset engines for the data-analysis course

pub mod models;
pub mod services;
