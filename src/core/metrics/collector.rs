use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::clock::{Clock, SystemClock};
use super::rolling::{BucketKind, CounterWindow, DEFAULT_COUNTER_WINDOW_SECS};
use super::rolling_timing::{LatencyWindow, DEFAULT_LATENCY_WINDOW_SECS};

/// Outcome classification reported for one unit of protected work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionEvent {
    Success,
    Failure,
    Timeout,
    Rejected,
    ShortCircuit,
    FallbackSuccess,
    FallbackFailure,
}

impl ExecutionEvent {
    pub fn is_error(self) -> bool {
        matches!(
            self,
            ExecutionEvent::Failure
                | ExecutionEvent::Timeout
                | ExecutionEvent::Rejected
                | ExecutionEvent::ShortCircuit
        )
    }
}

/// Per-execution deltas handed to every [`MetricCollector`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricResult {
    pub attempts: f64,
    pub errors: f64,
    pub successes: f64,
    pub failures: f64,
    pub rejects: f64,
    pub short_circuits: f64,
    pub timeouts: f64,
    pub fallback_successes: f64,
    pub fallback_failures: f64,
    pub queue_size: f64,
    pub total_duration: Duration,
    pub run_duration: Duration,
}

impl MetricResult {
    /// Folds the events of a single execution into one result.
    pub fn from_events(events: &[ExecutionEvent], total: Duration, run: Duration) -> Self {
        let mut result = MetricResult {
            attempts: 1.0,
            total_duration: total,
            run_duration: run,
            ..Default::default()
        };
        for event in events {
            match event {
                ExecutionEvent::Success => result.successes += 1.0,
                ExecutionEvent::Failure => result.failures += 1.0,
                ExecutionEvent::Timeout => result.timeouts += 1.0,
                ExecutionEvent::Rejected => result.rejects += 1.0,
                ExecutionEvent::ShortCircuit => result.short_circuits += 1.0,
                ExecutionEvent::FallbackSuccess => result.fallback_successes += 1.0,
                ExecutionEvent::FallbackFailure => result.fallback_failures += 1.0,
            }
            if event.is_error() {
                result.errors += 1.0;
            }
        }
        result
    }
}

pub trait MetricCollector: Send + Sync {
    fn update(&self, result: &MetricResult);
    fn reset(&self);
}

/// Window widths and clock used by [`RollingMetricCollector`].
#[derive(Clone)]
pub struct RollingSettings {
    pub counter_window_secs: i64,
    pub latency_window_secs: i64,
    pub clock: Arc<dyn Clock>,
}

impl Default for RollingSettings {
    fn default() -> Self {
        Self {
            counter_window_secs: DEFAULT_COUNTER_WINDOW_SECS,
            latency_window_secs: DEFAULT_LATENCY_WINDOW_SECS,
            clock: Arc::new(SystemClock),
        }
    }
}

/// The in-process collector read by health checks: one rolling window per
/// outcome counter plus total/run duration windows.
pub struct RollingMetricCollector {
    settings: RollingSettings,
    windows: RwLock<Arc<RollingWindows>>,
}

pub struct RollingWindows {
    pub attempts: CounterWindow,
    pub errors: CounterWindow,
    pub successes: CounterWindow,
    pub failures: CounterWindow,
    pub rejects: CounterWindow,
    pub short_circuits: CounterWindow,
    pub timeouts: CounterWindow,
    pub fallback_successes: CounterWindow,
    pub fallback_failures: CounterWindow,
    pub total_duration: LatencyWindow,
    pub run_duration: LatencyWindow,
}

impl RollingWindows {
    fn new(settings: &RollingSettings) -> Self {
        let counter = || {
            CounterWindow::with_window(
                BucketKind::Sum,
                settings.counter_window_secs,
                settings.clock.clone(),
            )
        };
        let latency =
            || LatencyWindow::with_window(settings.latency_window_secs, settings.clock.clone());
        Self {
            attempts: counter(),
            errors: counter(),
            successes: counter(),
            failures: counter(),
            rejects: counter(),
            short_circuits: counter(),
            timeouts: counter(),
            fallback_successes: counter(),
            fallback_failures: counter(),
            total_duration: latency(),
            run_duration: latency(),
        }
    }
}

impl RollingMetricCollector {
    pub fn new() -> Self {
        Self::with_settings(RollingSettings::default())
    }

    pub fn with_settings(settings: RollingSettings) -> Self {
        let windows = Arc::new(RollingWindows::new(&settings));
        Self {
            settings,
            windows: RwLock::new(windows),
        }
    }

    /// Current set of windows. A later [`MetricCollector::reset`] replaces the
    /// set; handles taken before it keep reading the old one.
    pub fn windows(&self) -> Arc<RollingWindows> {
        self.windows.read().clone()
    }

    /// Share of attempts that ended in an error, rounded to the nearest
    /// percent. `0` when there were no attempts.
    pub fn error_percent_at(&self, now_secs: i64) -> u32 {
        let windows = self.windows();
        let attempts = windows.attempts.sum_at(now_secs);
        if attempts <= 0.0 {
            return 0;
        }
        let errors = windows.errors.sum_at(now_secs);
        let percent = (errors / attempts * 100.0 + 0.5).max(0.0);
        percent as u32
    }

    pub fn error_percent(&self) -> u32 {
        self.error_percent_at(self.settings.clock.now_secs())
    }
}

impl Default for RollingMetricCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricCollector for RollingMetricCollector {
    fn update(&self, result: &MetricResult) {
        let windows = self.windows();
        let counters = [
            (&windows.attempts, result.attempts),
            (&windows.errors, result.errors),
            (&windows.successes, result.successes),
            (&windows.failures, result.failures),
            (&windows.rejects, result.rejects),
            (&windows.short_circuits, result.short_circuits),
            (&windows.timeouts, result.timeouts),
            (&windows.fallback_successes, result.fallback_successes),
            (&windows.fallback_failures, result.fallback_failures),
        ];
        for (window, value) in counters {
            if value != 0.0 {
                window.increment(value);
            }
        }
        windows.total_duration.add(result.total_duration);
        windows.run_duration.add(result.run_duration);
    }

    fn reset(&self) {
        let fresh = Arc::new(RollingWindows::new(&self.settings));
        *self.windows.write() = fresh;
    }
}

type CollectorFactory = Box<dyn Fn(&str) -> Arc<dyn MetricCollector> + Send + Sync>;

/// Factories used to build the collectors attached to each named circuit.
pub struct CollectorRegistry {
    rolling: RollingSettings,
    factories: RwLock<Vec<CollectorFactory>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::with_rolling_settings(RollingSettings::default())
    }

    pub fn with_rolling_settings(rolling: RollingSettings) -> Self {
        Self {
            rolling,
            factories: RwLock::new(Vec::new()),
        }
    }

    pub fn register<F>(&self, factory: F)
    where
        F: Fn(&str) -> Arc<dyn MetricCollector> + Send + Sync + 'static,
    {
        self.factories.write().push(Box::new(factory));
    }

    /// Builds the rolling collector plus one collector per registered factory.
    pub fn initialize_collectors(&self, name: &str) -> CircuitMetrics {
        let rolling = Arc::new(RollingMetricCollector::with_settings(self.rolling.clone()));
        let extra = self
            .factories
            .read()
            .iter()
            .map(|factory| factory(name))
            .collect();
        tracing::debug!(target: "metrics", circuit = name, "metric collectors initialized");
        CircuitMetrics {
            name: name.to_string(),
            rolling,
            extra,
        }
    }
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Every collector attached to one circuit.
pub struct CircuitMetrics {
    name: String,
    rolling: Arc<RollingMetricCollector>,
    extra: Vec<Arc<dyn MetricCollector>>,
}

impl CircuitMetrics {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rolling(&self) -> &RollingMetricCollector {
        &self.rolling
    }

    pub fn collector_count(&self) -> usize {
        1 + self.extra.len()
    }

    pub fn record(&self, events: &[ExecutionEvent], total: Duration, run: Duration) {
        self.update(&MetricResult::from_events(events, total, run));
    }

    pub fn update(&self, result: &MetricResult) {
        self.rolling.update(result);
        for collector in &self.extra {
            collector.update(result);
        }
    }

    pub fn reset(&self) {
        self.rolling.reset();
        for collector in &self.extra {
            collector.reset();
        }
    }
}
