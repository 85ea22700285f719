use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::metrics::clock::{Clock, SystemClock};
use crate::core::metrics::{
    BucketKind, CounterWindow, LatencyWindow, ReporterSettings, RollingSettings,
    DEFAULT_COUNTER_WINDOW_SECS, DEFAULT_LATENCY_WINDOW_SECS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowCfg {
    #[serde(default = "default_counter_window")] pub counter_window_seconds: i64,
    #[serde(default = "default_latency_window")] pub latency_window_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportCfg {
    #[serde(default)] pub enabled: bool,
    #[serde(default = "default_prefix")] pub prefix: String,
    #[serde(default = "default_tick_interval_ms")] pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingCfg {
    #[serde(default = "default_log_level")] pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    #[serde(default)] pub windows: WindowCfg,
    #[serde(default)] pub export: ExportCfg,
    #[serde(default)] pub logging: LoggingCfg,
}

fn default_counter_window() -> i64 { DEFAULT_COUNTER_WINDOW_SECS }
fn default_latency_window() -> i64 { DEFAULT_LATENCY_WINDOW_SECS }
fn default_prefix() -> String { "circuit".to_string() }
fn default_tick_interval_ms() -> u64 { 10_000 }
fn default_log_level() -> String { "info".to_string() }

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            counter_window_seconds: default_counter_window(),
            latency_window_seconds: default_latency_window(),
        }
    }
}

impl Default for ExportCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: default_prefix(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            windows: WindowCfg::default(),
            export: ExportCfg::default(),
            logging: LoggingCfg::default(),
        }
    }
}

impl TelemetryConfig {
    pub fn counter_window(&self, kind: BucketKind) -> CounterWindow {
        CounterWindow::with_window(kind, self.windows.counter_window_seconds, Arc::new(SystemClock))
    }

    pub fn latency_window(&self) -> LatencyWindow {
        LatencyWindow::with_window(self.windows.latency_window_seconds, Arc::new(SystemClock))
    }

    pub fn rolling_settings(&self, clock: Arc<dyn Clock>) -> RollingSettings {
        RollingSettings {
            counter_window_secs: self.windows.counter_window_seconds,
            latency_window_secs: self.windows.latency_window_seconds,
            clock,
        }
    }

    pub fn reporter_settings(&self) -> ReporterSettings {
        ReporterSettings {
            prefix: self.export.prefix.clone(),
            tick_interval: Duration::from_millis(self.export.tick_interval_ms),
            ..ReporterSettings::default()
        }
    }
}
