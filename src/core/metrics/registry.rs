use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::error::MetricError;

const HISTOGRAM_MAX_MS: u64 = 3_600_000; // one hour ceiling in milliseconds
const HISTOGRAM_SIG_FIGS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    Counter,
    Timer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub name: String,
    pub count: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
    pub p50_ms: u64,
    pub p75_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub p999_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub counters: Vec<CounterSnapshot>,
    pub timers: Vec<TimerSnapshot>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.timers.is_empty()
    }
}

/// Named counters and timers keyed by dotted metric name.
///
/// Unlike the rolling windows these series are cumulative; an exporter reads
/// them on its own schedule.
#[derive(Default)]
pub struct MetricRegistry {
    series: DashMap<String, Series>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_counter(&self, name: &str, delta: i64) -> Result<(), MetricError> {
        match self.get_or_create(name, MetricKind::Counter)? {
            Series::Counter(counter) => {
                counter.fetch_add(delta, Ordering::Relaxed);
                Ok(())
            }
            Series::Timer(_) => Err(mismatch(name, MetricKind::Timer, MetricKind::Counter)),
        }
    }

    pub fn update_timer(&self, name: &str, value: Duration) -> Result<(), MetricError> {
        match self.get_or_create(name, MetricKind::Timer)? {
            Series::Timer(timer) => {
                timer.lock().observe(value);
                Ok(())
            }
            Series::Counter(_) => Err(mismatch(name, MetricKind::Counter, MetricKind::Timer)),
        }
    }

    pub fn get_counter(&self, name: &str) -> Option<i64> {
        match self.series.get(name)?.value() {
            Series::Counter(counter) => Some(counter.load(Ordering::Relaxed)),
            Series::Timer(_) => None,
        }
    }

    pub fn get_timer(&self, name: &str) -> Option<TimerSnapshot> {
        match self.series.get(name)?.value() {
            Series::Timer(timer) => Some(timer.lock().snapshot(name)),
            Series::Counter(_) => None,
        }
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.series.get(name).map(|entry| entry.value().kind())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn clear(&self) {
        self.series.clear();
    }

    /// Every series, sorted by name.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let entries: Vec<(String, Series)> = self
            .series
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let mut snapshot = RegistrySnapshot::default();
        for (name, series) in entries {
            match series {
                Series::Counter(counter) => snapshot.counters.push(CounterSnapshot {
                    name,
                    count: counter.load(Ordering::Relaxed),
                }),
                Series::Timer(timer) => {
                    let timer = timer.lock().snapshot(&name);
                    snapshot.timers.push(timer);
                }
            }
        }
        snapshot.counters.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot.timers.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot
    }

    fn get_or_create(&self, name: &str, kind: MetricKind) -> Result<Series, MetricError> {
        if name.is_empty() {
            return Err(MetricError::EmptyName);
        }
        if let Some(existing) = self.series.get(name) {
            return Ok(existing.value().clone());
        }
        let fresh = Series::new(name, kind)?;
        let entry = self.series.entry(name.to_string()).or_insert(fresh);
        Ok(entry.value().clone())
    }
}

fn mismatch(name: &str, existing: MetricKind, requested: MetricKind) -> MetricError {
    MetricError::KindMismatch {
        name: name.to_string(),
        existing,
        requested,
    }
}

#[derive(Clone)]
enum Series {
    Counter(Arc<AtomicI64>),
    Timer(Arc<Mutex<TimerSeries>>),
}

impl Series {
    fn new(name: &str, kind: MetricKind) -> Result<Self, MetricError> {
        match kind {
            MetricKind::Counter => Ok(Series::Counter(Arc::new(AtomicI64::new(0)))),
            MetricKind::Timer => {
                let timer = TimerSeries::new().map_err(|err| MetricError::Histogram {
                    name: name.to_string(),
                    reason: err.to_string(),
                })?;
                Ok(Series::Timer(Arc::new(Mutex::new(timer))))
            }
        }
    }

    fn kind(&self) -> MetricKind {
        match self {
            Series::Counter(_) => MetricKind::Counter,
            Series::Timer(_) => MetricKind::Timer,
        }
    }
}

struct TimerSeries {
    hist: Histogram<u64>,
    count: u64,
    sum: Duration,
    min: Duration,
    max: Duration,
}

impl TimerSeries {
    fn new() -> Result<Self, hdrhistogram::CreationError> {
        Ok(Self {
            hist: Histogram::new_with_bounds(1, HISTOGRAM_MAX_MS, HISTOGRAM_SIG_FIGS)?,
            count: 0,
            sum: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        })
    }

    fn observe(&mut self, value: Duration) {
        self.count = self.count.saturating_add(1);
        self.sum = self.sum.saturating_add(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        // sub-millisecond samples land in the zero bucket
        let record_value = value.as_millis().min(u128::from(HISTOGRAM_MAX_MS)) as u64;
        let _ = self.hist.record(record_value);
    }

    fn snapshot(&self, name: &str) -> TimerSnapshot {
        if self.count == 0 {
            return TimerSnapshot {
                name: name.to_string(),
                count: 0,
                min_ms: 0,
                max_ms: 0,
                mean_ms: 0.0,
                p50_ms: 0,
                p75_ms: 0,
                p95_ms: 0,
                p99_ms: 0,
                p999_ms: 0,
            };
        }
        let mean_ms = self.sum.as_secs_f64() * 1_000.0 / self.count as f64;
        let max_ms = millis_to_u64(self.max);
        // bucket rounding must not report a quantile above the observed max
        let quantile = |q: f64| self.hist.value_at_quantile(q).min(max_ms);
        TimerSnapshot {
            name: name.to_string(),
            count: self.count,
            min_ms: millis_to_u64(self.min),
            max_ms,
            mean_ms,
            p50_ms: quantile(0.5),
            p75_ms: quantile(0.75),
            p95_ms: quantile(0.95),
            p99_ms: quantile(0.99),
            p999_ms: quantile(0.999),
        }
    }
}

fn millis_to_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
