use std::sync::Arc;

use parking_lot::RwLock;

use super::clock::{Clock, SystemClock};

pub const DEFAULT_COUNTER_WINDOW_SECS: i64 = 10;

/// Merge semantic of a [`CounterWindow`], fixed for the window's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    /// Each bucket holds the running sum of its second.
    Sum,
    /// Each bucket holds the running maximum of its second.
    Max,
}

/// Rolling sum/max/average of a scalar over the trailing `window_seconds` seconds.
///
/// Storage is `window_seconds + 1` one-second buckets allocated up front; the
/// spare slot keeps the bucket being written from colliding with the oldest
/// in-window bucket once the window wraps. Stale buckets are only cleared
/// when a writer lands on them.
pub struct CounterWindow {
    kind: BucketKind,
    window_secs: i64,
    buckets: RwLock<Box<[CounterSlot]>>,
    clock: Arc<dyn Clock>,
}

impl CounterWindow {
    /// Sum-kind window over the default 10 seconds on the system clock.
    pub fn new() -> Self {
        Self::with_kind(BucketKind::Sum)
    }

    /// Max-kind window over the default 10 seconds on the system clock.
    pub fn max_window() -> Self {
        Self::with_kind(BucketKind::Max)
    }

    pub fn with_kind(kind: BucketKind) -> Self {
        Self::with_clock(kind, Arc::new(SystemClock))
    }

    pub fn with_clock(kind: BucketKind, clock: Arc<dyn Clock>) -> Self {
        Self::with_window(kind, DEFAULT_COUNTER_WINDOW_SECS, clock)
    }

    /// A `window_seconds` below 1 is clamped to 1.
    pub fn with_window(kind: BucketKind, window_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        let window_secs = window_seconds.max(1);
        let slots = (window_secs + 1) as usize;
        Self {
            kind,
            window_secs,
            buckets: RwLock::new((0..slots).map(|_| CounterSlot::new()).collect()),
            clock,
        }
    }

    pub fn kind(&self) -> BucketKind {
        self.kind
    }

    pub fn window_seconds(&self) -> i64 {
        self.window_secs
    }

    /// Merges `value` with the configured bucket kind.
    pub fn record(&self, value: f64) {
        self.merge(value, self.kind);
    }

    /// Adds `value` to the current second's bucket.
    pub fn increment(&self, value: f64) {
        self.merge(value, BucketKind::Sum);
    }

    /// Raises the current second's bucket to `value` if it is larger.
    pub fn update_max(&self, value: f64) {
        self.merge(value, BucketKind::Max);
    }

    pub fn sum(&self) -> f64 {
        self.sum_at(self.clock.now_secs())
    }

    /// Sum over buckets in the window ending at epoch second `now_secs`.
    pub fn sum_at(&self, now_secs: i64) -> f64 {
        let min = self.min_time(now_secs);
        let buckets = self.buckets.read();
        buckets
            .iter()
            .filter(|slot| slot.stamp >= min)
            .map(|slot| slot.value)
            .sum()
    }

    pub fn max(&self) -> f64 {
        self.max_at(self.clock.now_secs())
    }

    /// Largest in-window bucket value, or `0` when nothing qualifies.
    ///
    /// `0` doubles as the "no data" answer, so a window holding only negative
    /// values also reports `0`.
    pub fn max_at(&self, now_secs: i64) -> f64 {
        let min = self.min_time(now_secs);
        let buckets = self.buckets.read();
        let mut max = 0.0;
        for slot in buckets.iter().filter(|slot| slot.stamp >= min) {
            if slot.value > max {
                max = slot.value;
            }
        }
        max
    }

    pub fn avg(&self) -> f64 {
        self.avg_at(self.clock.now_secs())
    }

    /// Always divides by the full window width, even while the window is
    /// still filling up.
    pub fn avg_at(&self, now_secs: i64) -> f64 {
        self.sum_at(now_secs) / self.window_secs as f64
    }

    fn merge(&self, value: f64, style: BucketKind) {
        if style != self.kind {
            tracing::debug!(
                target: "rolling",
                configured = ?self.kind,
                write = ?style,
                "counter window written with a mismatched bucket kind"
            );
        }
        let mut buckets = self.buckets.write();
        let now = self.clock.now_secs();
        let idx = self.index_of(now);
        let slot = &mut buckets[idx];
        slot.ensure(now);
        match style {
            BucketKind::Sum => slot.value += value,
            BucketKind::Max => {
                if value > slot.value {
                    slot.value = value;
                }
            }
        }
    }

    fn index_of(&self, secs: i64) -> usize {
        secs.rem_euclid(self.window_secs + 1) as usize
    }

    fn min_time(&self, secs: i64) -> i64 {
        secs.saturating_sub(self.window_secs - 1)
    }
}

impl Default for CounterWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CounterWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterWindow")
            .field("kind", &self.kind)
            .field("window_secs", &self.window_secs)
            .finish_non_exhaustive()
    }
}

struct CounterSlot {
    stamp: i64,
    value: f64,
}

impl CounterSlot {
    fn new() -> Self {
        Self {
            stamp: i64::MIN,
            value: 0.0,
        }
    }

    fn ensure(&mut self, stamp: i64) {
        if self.stamp != stamp {
            self.stamp = stamp;
            self.value = 0.0;
        }
    }
}
