use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Source of "now" for the rolling windows.
///
/// Implementations must be free of side effects beyond reading time so that
/// scripted test sequences stay reproducible.
pub trait Clock: Send + Sync {
    /// Current time in whole epoch seconds.
    fn now_secs(&self) -> i64;
    /// Current time in epoch nanoseconds.
    fn now_nanos(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        since_epoch().as_secs() as i64
    }

    fn now_nanos(&self) -> i64 {
        i64::try_from(since_epoch().as_nanos()).unwrap_or(i64::MAX)
    }
}

fn since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
}

/// Settable clock for tests. Seconds are always derived from the stored nanos.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_secs(secs: i64) -> Self {
        let clock = Self::new();
        clock.set_secs(secs);
        clock
    }

    pub fn set_secs(&self, secs: i64) {
        self.nanos
            .store(secs.saturating_mul(NANOS_PER_SEC), Ordering::Relaxed);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.nanos
            .fetch_add(secs.saturating_mul(NANOS_PER_SEC), Ordering::Relaxed);
    }

    pub fn set(&self, since_epoch: Duration) {
        let nanos = i64::try_from(since_epoch.as_nanos()).unwrap_or(i64::MAX);
        self.nanos.store(nanos, Ordering::Relaxed);
    }

    pub fn advance(&self, delta: Duration) {
        let nanos = i64::try_from(delta.as_nanos()).unwrap_or(i64::MAX);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.nanos.load(Ordering::Relaxed).div_euclid(NANOS_PER_SEC)
    }

    fn now_nanos(&self) -> i64 {
        self.nanos.load(Ordering::Relaxed)
    }
}

type SecsFn = Box<dyn Fn() -> i64 + Send + Sync>;

/// Clock driven by closures, used to replay scripted time sequences.
///
/// Without an explicit nanosecond source, nanos are `secs * 1e9` computed from
/// a fresh call to the seconds closure.
pub struct FnClock {
    secs: SecsFn,
    nanos: Option<SecsFn>,
}

impl FnClock {
    pub fn new<F>(secs: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        Self {
            secs: Box::new(secs),
            nanos: None,
        }
    }

    pub fn with_nanos<F>(mut self, nanos: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.nanos = Some(Box::new(nanos));
        self
    }
}

impl Clock for FnClock {
    fn now_secs(&self) -> i64 {
        (self.secs)()
    }

    fn now_nanos(&self) -> i64 {
        match &self.nanos {
            Some(nanos) => nanos(),
            None => (self.secs)().saturating_mul(NANOS_PER_SEC),
        }
    }
}

impl std::fmt::Debug for FnClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClock")
            .field("explicit_nanos", &self.nanos.is_some())
            .finish()
    }
}
