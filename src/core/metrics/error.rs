use thiserror::Error;

use super::registry::MetricKind;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("metric '{name}' is registered as a {existing:?}, not a {requested:?}")]
    KindMismatch {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },
    #[error("metric name must not be empty")]
    EmptyName,
    #[error("failed to allocate histogram for '{name}': {reason}")]
    Histogram { name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write metrics report: {0}")]
    Sink(#[from] std::io::Error),
    #[error("failed to start metrics reporter: {0}")]
    Spawn(String),
}
