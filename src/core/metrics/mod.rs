use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::core::config::model::TelemetryConfig;

pub mod clock;
mod collector;
mod descriptors;
mod error;
mod event_bridge;
mod export;
mod registry;
mod rolling;
mod rolling_timing;

pub use clock::{Clock, FnClock, ManualClock, SystemClock};
pub use collector::{
    CircuitMetrics, CollectorRegistry, ExecutionEvent, MetricCollector, MetricResult,
    RollingMetricCollector, RollingSettings, RollingWindows,
};
pub use descriptors::*;
pub use error::{ExportError, MetricError};
pub use event_bridge::{sanitize_circuit_name, NamedMetricCollector};
pub use export::{
    encode_json, encode_plaintext, report_once, Reporter, ReporterHandle, ReporterSettings,
};
pub use registry::{
    CounterSnapshot, MetricKind, MetricRegistry, RegistrySnapshot, TimerSnapshot,
};
pub use rolling::{BucketKind, CounterWindow, DEFAULT_COUNTER_WINDOW_SECS};
pub use rolling_timing::{ordinal, LatencyWindow, DEFAULT_LATENCY_WINDOW_SECS};

static REGISTRY: OnceCell<Arc<MetricRegistry>> = OnceCell::new();

pub fn global_registry() -> Arc<MetricRegistry> {
    REGISTRY
        .get_or_init(|| Arc::new(MetricRegistry::new()))
        .clone()
}

/// Collector registry wired from configuration: the rolling collector always,
/// plus named-metric forwarding into the global registry when export is on.
pub fn collector_registry(cfg: &TelemetryConfig, command_group: &str) -> CollectorRegistry {
    let registry = CollectorRegistry::with_rolling_settings(
        cfg.rolling_settings(Arc::new(SystemClock)),
    );
    if cfg.export.enabled {
        registry.register(NamedMetricCollector::factory(
            global_registry(),
            command_group,
        ));
    }
    registry
}

/// Starts the background exporter over the global registry, or returns
/// `None` when export is disabled.
pub fn init_export<W>(cfg: &TelemetryConfig, sink: W) -> Result<Option<ReporterHandle>, ExportError>
where
    W: std::io::Write + Send + 'static,
{
    if !cfg.export.enabled {
        return Ok(None);
    }
    let handle = Reporter::spawn(global_registry(), cfg.reporter_settings(), sink)?;
    tracing::info!(
        target: "metrics",
        prefix = %cfg.export.prefix,
        tick_ms = cfg.export.tick_interval_ms,
        "metrics reporter started"
    );
    Ok(Some(handle))
}
