use super::registry::MetricKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub kind: MetricKind,
}

impl MetricDescriptor {
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
        }
    }

    pub const fn timer(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Timer,
        }
    }
}

pub const ATTEMPTS: MetricDescriptor = MetricDescriptor::counter("attempts");
pub const ERRORS: MetricDescriptor = MetricDescriptor::counter("errors");
pub const QUEUE_LENGTH: MetricDescriptor = MetricDescriptor::counter("queueLength");
pub const SUCCESSES: MetricDescriptor = MetricDescriptor::counter("successes");
pub const FAILURES: MetricDescriptor = MetricDescriptor::counter("failures");
pub const REJECTS: MetricDescriptor = MetricDescriptor::counter("rejects");
pub const SHORT_CIRCUITS: MetricDescriptor = MetricDescriptor::counter("shortCircuits");
pub const TIMEOUTS: MetricDescriptor = MetricDescriptor::counter("timeouts");
pub const FALLBACK_SUCCESSES: MetricDescriptor = MetricDescriptor::counter("fallbackSuccesses");
pub const FALLBACK_FAILURES: MetricDescriptor = MetricDescriptor::counter("fallbackFailures");

pub const TOTAL_DURATION: MetricDescriptor = MetricDescriptor::timer("totalDuration");
pub const RUN_DURATION: MetricDescriptor = MetricDescriptor::timer("runDuration");

pub const CIRCUIT_METRICS: &[MetricDescriptor] = &[
    ATTEMPTS,
    ERRORS,
    QUEUE_LENGTH,
    SUCCESSES,
    FAILURES,
    REJECTS,
    SHORT_CIRCUITS,
    TIMEOUTS,
    FALLBACK_SUCCESSES,
    FALLBACK_FAILURES,
    TOTAL_DURATION,
    RUN_DURATION,
];
