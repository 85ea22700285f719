use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::clock::{Clock, SystemClock};

pub const DEFAULT_LATENCY_WINDOW_SECS: i64 = 60;

const CACHE_TTL_NANOS: i64 = 1_000_000_000;
const NANOS_PER_MILLI: u128 = 1_000_000;

/// Rolling set of duration samples over the trailing `window_seconds` seconds.
///
/// Percentile and mean queries read a sorted snapshot of all in-window
/// samples that is rebuilt at most once per elapsed second of the
/// nanosecond clock. Samples within one second are not capped.
pub struct LatencyWindow {
    window_secs: i64,
    state: RwLock<TimingState>,
    clock: Arc<dyn Clock>,
}

struct TimingState {
    buckets: Box<[TimingSlot]>,
    cache: SortedCache,
}

impl LatencyWindow {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_window(DEFAULT_LATENCY_WINDOW_SECS, clock)
    }

    /// A `window_seconds` below 1 is clamped to 1.
    pub fn with_window(window_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        let window_secs = window_seconds.max(1);
        let slots = (window_secs + 1) as usize;
        Self {
            window_secs,
            state: RwLock::new(TimingState {
                buckets: (0..slots).map(|_| TimingSlot::new()).collect(),
                cache: SortedCache::empty(),
            }),
            clock,
        }
    }

    pub fn window_seconds(&self) -> i64 {
        self.window_secs
    }

    /// Appends `duration` to the current second's bucket.
    pub fn add(&self, duration: Duration) {
        let mut state = self.state.write();
        let now = self.clock.now_secs();
        let idx = self.index_of(now);
        let slot = &mut state.buckets[idx];
        slot.ensure(now);
        slot.durations.push(duration);
    }

    /// All in-window samples, shortest first.
    pub fn sorted_durations(&self) -> Arc<[Duration]> {
        let now_nanos = self.clock.now_nanos();
        if let Some(sorted) = self.state.read().cache.fresh_at(now_nanos) {
            return sorted;
        }

        let mut state = self.state.write();
        // another reader may have rebuilt it while we waited
        if let Some(sorted) = state.cache.fresh_at(now_nanos) {
            return sorted;
        }
        let min = self.min_time(self.clock.now_secs());
        let mut durations: Vec<Duration> = state
            .buckets
            .iter()
            .filter(|slot| slot.stamp >= min)
            .flat_map(|slot| slot.durations.iter().copied())
            .collect();
        durations.sort_unstable();

        let sorted: Arc<[Duration]> = durations.into();
        state.cache = SortedCache {
            sorted: sorted.clone(),
            computed_at: Some(now_nanos),
        };
        sorted
    }

    /// Nearest-rank percentile in whole milliseconds, `0` when empty.
    ///
    /// `p` is clamped to `[0, 100]`; `percentile(0.0)` is the smallest sample
    /// and `percentile(100.0)` the largest.
    pub fn percentile(&self, p: f64) -> u32 {
        let sorted = self.sorted_durations();
        if sorted.is_empty() {
            return 0;
        }
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
        let rank = ordinal(sorted.len(), p).clamp(1, sorted.len());
        to_millis(sorted[rank - 1].as_nanos())
    }

    /// Arithmetic mean in whole milliseconds, `0` when empty.
    pub fn mean(&self) -> u32 {
        let sorted = self.sorted_durations();
        if sorted.is_empty() {
            return 0;
        }
        let total: u128 = sorted.iter().map(Duration::as_nanos).sum();
        to_millis(total / sorted.len() as u128)
    }

    pub fn len(&self) -> usize {
        self.sorted_durations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index_of(&self, secs: i64) -> usize {
        secs.rem_euclid(self.window_secs + 1) as usize
    }

    fn min_time(&self, secs: i64) -> i64 {
        secs.saturating_sub(self.window_secs - 1)
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LatencyWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyWindow")
            .field("window_secs", &self.window_secs)
            .finish_non_exhaustive()
    }
}

/// 1-based nearest rank for `percentile` of `length` samples.
///
/// `ceil(percentile / 100 * length)`, except that `0` maps to rank `1` so the
/// minimum stays addressable.
pub fn ordinal(length: usize, percentile: f64) -> usize {
    if percentile == 0.0 && length > 0 {
        return 1;
    }
    let rank = (percentile / 100.0 * length as f64).ceil();
    if rank.is_nan() || rank <= 0.0 {
        0
    } else {
        rank as usize
    }
}

fn to_millis(nanos: u128) -> u32 {
    u32::try_from(nanos / NANOS_PER_MILLI).unwrap_or(u32::MAX)
}

struct SortedCache {
    sorted: Arc<[Duration]>,
    computed_at: Option<i64>,
}

impl SortedCache {
    fn empty() -> Self {
        Self {
            sorted: Arc::from(Vec::new()),
            computed_at: None,
        }
    }

    fn fresh_at(&self, now_nanos: i64) -> Option<Arc<[Duration]>> {
        match self.computed_at {
            Some(at) if at.saturating_add(CACHE_TTL_NANOS) > now_nanos => Some(self.sorted.clone()),
            _ => None,
        }
    }
}

struct TimingSlot {
    stamp: i64,
    durations: Vec<Duration>,
}

impl TimingSlot {
    fn new() -> Self {
        Self {
            stamp: i64::MIN,
            durations: Vec::new(),
        }
    }

    fn ensure(&mut self, stamp: i64) {
        if self.stamp != stamp {
            self.stamp = stamp;
            self.durations.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::clock::{FnClock, ManualClock};
    use std::sync::atomic::{AtomicI64, Ordering};

    fn scripted(script: impl Fn(i64) -> i64 + Send + Sync + 'static) -> Arc<dyn Clock> {
        let calls = AtomicI64::new(0);
        Arc::new(FnClock::new(move || {
            let n = calls.fetch_add(1, Ordering::Relaxed) + 1;
            script(n)
        }))
    }

    fn secs_ms(secs: u64) -> u32 {
        (secs * 1_000) as u32
    }

    #[test]
    fn test_ordinal_table() {
        let cases = [
            (1, 0.0, 1),
            (2, 0.0, 1),
            (2, 50.0, 1),
            (2, 51.0, 2),
            (5, 30.0, 2),
            (5, 40.0, 2),
            (5, 50.0, 3),
            (11, 25.0, 3),
            (11, 50.0, 6),
            (11, 75.0, 9),
            (11, 100.0, 11),
        ];
        for (length, perc, expected) in cases {
            assert_eq!(ordinal(length, perc), expected, "ordinal({length}, {perc})");
        }
        assert_eq!(ordinal(0, 0.0), 0);
    }

    #[test]
    fn test_empty_window_reads_zero() {
        let timing = LatencyWindow::with_clock(Arc::new(ManualClock::at_secs(10)));
        assert_eq!(timing.mean(), 0);
        assert_eq!(timing.percentile(50.0), 0);
        assert!(timing.is_empty());
    }

    #[test]
    fn test_mean_of_two_timings() {
        let clock = Arc::new(ManualClock::at_secs(1_000));
        let timing = LatencyWindow::with_clock(clock.clone());
        timing.add(Duration::from_millis(100));
        clock.advance_secs(2);
        timing.add(Duration::from_millis(200));
        assert_eq!(timing.mean(), 150);
    }

    #[test]
    fn test_fixture_percentiles() {
        let timing = LatencyWindow::with_clock(Arc::new(ManualClock::at_secs(1_000)));
        let mut fixture = vec![1u64];
        fixture.extend(std::iter::repeat(1004).take(8));
        fixture.extend(std::iter::repeat(1005).take(14));
        fixture.extend(std::iter::repeat(1006).take(4));
        fixture.extend(std::iter::repeat(1007).take(3));
        fixture.extend([1008, 1015]);
        for ms in fixture {
            timing.add(Duration::from_millis(ms));
        }
        assert_eq!(timing.percentile(0.0), 1);
        assert_eq!(timing.percentile(75.0), 1006);
        assert_eq!(timing.percentile(99.0), 1015);
        assert_eq!(timing.percentile(100.0), 1015);
    }

    #[test]
    fn test_two_consecutive_seconds() {
        let timing = LatencyWindow::with_clock(scripted(|call| if call <= 100 { 61 } else { 62 }));
        for _ in 0..150 {
            timing.add(Duration::from_secs(1));
        }
        for p in [1.0, 25.0, 50.0, 75.0, 99.0] {
            assert_eq!(timing.percentile(p), secs_ms(1), "p{p}");
        }
        assert_eq!(timing.mean(), secs_ms(1));
    }

    #[test]
    fn test_sixty_seconds() {
        let timing =
            LatencyWindow::with_clock(scripted(|call| if call <= 60 { 60 + call } else { 120 }));
        for x in 0..60 {
            timing.add(Duration::from_secs(1 + x));
        }
        assert_eq!(timing.percentile(1.0), secs_ms(1));
        assert_eq!(timing.percentile(25.0), secs_ms(15));
        assert_eq!(timing.percentile(50.0), secs_ms(30));
        assert_eq!(timing.percentile(75.0), secs_ms(45));
        assert_eq!(timing.percentile(99.0), secs_ms(60));
        assert_eq!(timing.mean(), 30_500);
    }

    #[test]
    fn test_hundred_seconds_keeps_last_sixty() {
        let timing =
            LatencyWindow::with_clock(scripted(|call| if call <= 100 { 60 + call } else { 160 }));
        for x in 0..100 {
            timing.add(Duration::from_secs(1 + x));
        }
        assert_eq!(timing.percentile(1.0), secs_ms(41));
        assert_eq!(timing.percentile(25.0), secs_ms(55));
        assert_eq!(timing.percentile(50.0), secs_ms(70));
        assert_eq!(timing.percentile(75.0), secs_ms(85));
        assert_eq!(timing.percentile(99.0), secs_ms(100));
        assert_eq!(timing.mean(), 70_500);
    }

    #[test]
    fn test_cache_rebuilt_once_per_second() {
        let secs_calls = Arc::new(AtomicI64::new(0));
        let counter = secs_calls.clone();
        let clock = FnClock::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
            300
        })
        .with_nanos(|| 300 * CACHE_TTL_NANOS);
        let timing = LatencyWindow::with_clock(Arc::new(clock));
        for ms in [5, 1, 3] {
            timing.add(Duration::from_millis(ms));
        }
        assert_eq!(secs_calls.load(Ordering::Relaxed), 3);

        for _ in 0..5 {
            assert_eq!(timing.percentile(50.0), 3);
        }
        for _ in 0..3 {
            assert_eq!(timing.mean(), 3);
        }
        // one seconds read for the single recomputation
        assert_eq!(secs_calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_cache_serves_stale_snapshot_within_a_second() {
        let clock = Arc::new(ManualClock::at_secs(400));
        let timing = LatencyWindow::with_clock(clock.clone());
        timing.add(Duration::from_millis(10));
        assert_eq!(timing.percentile(100.0), 10);

        timing.add(Duration::from_millis(90));
        clock.advance(Duration::from_millis(999));
        assert_eq!(timing.percentile(100.0), 10);

        clock.advance(Duration::from_millis(1));
        assert_eq!(timing.percentile(100.0), 90);
    }

    #[test]
    fn test_first_read_computes_at_clock_origin() {
        let timing = LatencyWindow::with_clock(Arc::new(ManualClock::new()));
        timing.add(Duration::from_millis(7));
        assert_eq!(timing.percentile(50.0), 7);
    }

    #[test]
    fn test_recurring_slot_is_cleared_on_wrap() {
        let clock = Arc::new(ManualClock::at_secs(122));
        let timing = LatencyWindow::with_clock(clock.clone());
        timing.add(Duration::from_millis(900));
        clock.set_secs(183);
        assert_eq!(timing.index_of(122), timing.index_of(183));
        timing.add(Duration::from_millis(20));
        assert_eq!(timing.sorted_durations().as_ref(), &[Duration::from_millis(20)]);
    }

    #[test]
    fn test_out_of_range_percentiles_are_clamped() {
        let timing = LatencyWindow::with_clock(Arc::new(ManualClock::at_secs(50)));
        for ms in [4, 8, 2] {
            timing.add(Duration::from_millis(ms));
        }
        assert_eq!(timing.percentile(-5.0), 2);
        assert_eq!(timing.percentile(250.0), 8);
        assert_eq!(timing.percentile(f64::NAN), 2);
    }
}
