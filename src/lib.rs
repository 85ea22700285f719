//! Rolling-window telemetry for circuit breaker health checks.
//!
//! [`CounterWindow`] keeps a rolling sum/max over the last 10 seconds and
//! [`LatencyWindow`] keeps duration samples over the last 60 seconds with
//! nearest-rank percentiles. [`crate::core::metrics`] also carries the collector
//! fan-out, a named counter/timer registry and a plaintext exporter.

pub mod core;
pub mod logging;

pub use crate::core::metrics::{
    BucketKind, Clock, CounterWindow, LatencyWindow, ManualClock, SystemClock,
};
