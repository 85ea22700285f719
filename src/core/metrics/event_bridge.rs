use std::sync::Arc;
use std::time::Duration;

use super::collector::{MetricCollector, MetricResult};
use super::descriptors::*;
use super::registry::{MetricKind, MetricRegistry};

/// Forwards each execution result to a [`MetricRegistry`] as named counter
/// increments and timer updates under `{commandGroup}.{circuit}.{metric}`.
///
/// It never reads the rolling windows; it sees the same results independently.
pub struct NamedMetricCollector {
    registry: Arc<MetricRegistry>,
    base: String,
}

impl NamedMetricCollector {
    pub fn new(registry: Arc<MetricRegistry>, command_group: &str, circuit: &str) -> Self {
        let circuit = sanitize_circuit_name(circuit);
        let base = [command_group, circuit.as_str()]
            .iter()
            .filter(|segment| !segment.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(".");
        Self { registry, base }
    }

    /// Factory suitable for [`super::collector::CollectorRegistry::register`].
    pub fn factory(
        registry: Arc<MetricRegistry>,
        command_group: impl Into<String>,
    ) -> impl Fn(&str) -> Arc<dyn MetricCollector> + Send + Sync + 'static {
        let command_group = command_group.into();
        move |circuit: &str| -> Arc<dyn MetricCollector> {
            Arc::new(NamedMetricCollector::new(
                registry.clone(),
                &command_group,
                circuit,
            ))
        }
    }

    pub fn metric_name(&self, desc: MetricDescriptor) -> String {
        if self.base.is_empty() {
            desc.name.to_string()
        } else {
            format!("{}.{}", self.base, desc.name)
        }
    }

    fn increment(&self, desc: MetricDescriptor, value: f64) {
        if value <= 0.0 {
            return;
        }
        let name = self.metric_name(desc);
        if let Err(err) = self.registry.inc_counter(&name, value.round() as i64) {
            tracing::warn!(target: "metrics", error = %err, metric = %name, "failed to record counter");
        }
    }

    fn observe(&self, desc: MetricDescriptor, value: Duration) {
        debug_assert_eq!(desc.kind, MetricKind::Timer);
        let name = self.metric_name(desc);
        if let Err(err) = self.registry.update_timer(&name, value) {
            tracing::warn!(target: "metrics", error = %err, metric = %name, "failed to record timer");
        }
    }
}

impl MetricCollector for NamedMetricCollector {
    fn update(&self, result: &MetricResult) {
        self.increment(ATTEMPTS, result.attempts);
        self.increment(ERRORS, result.errors);
        self.increment(QUEUE_LENGTH, result.queue_size);
        self.increment(SUCCESSES, result.successes);
        self.increment(FAILURES, result.failures);
        self.increment(REJECTS, result.rejects);
        self.increment(SHORT_CIRCUITS, result.short_circuits);
        self.increment(TIMEOUTS, result.timeouts);
        self.increment(FALLBACK_SUCCESSES, result.fallback_successes);
        self.increment(FALLBACK_FAILURES, result.fallback_failures);
        self.observe(TOTAL_DURATION, result.total_duration);
        self.observe(RUN_DURATION, result.run_duration);
    }

    /// Registry series are cumulative; nothing to reset.
    fn reset(&self) {}
}

/// `/`, `:` and `.` would break the dotted hierarchy, so they become `-`.
pub fn sanitize_circuit_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | ':' | '.' => '-',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::collector::ExecutionEvent;

    #[test]
    fn test_sanitize_circuit_name() {
        assert_eq!(sanitize_circuit_name("api/v1:users.get"), "api-v1-users-get");
        assert_eq!(sanitize_circuit_name("plain"), "plain");
    }

    #[test]
    fn test_metric_names_are_hierarchical() {
        let registry = Arc::new(MetricRegistry::new());
        let named = NamedMetricCollector::new(registry.clone(), "billing", "charge/card");
        assert_eq!(named.metric_name(ATTEMPTS), "billing.charge-card.attempts");

        let group_only = NamedMetricCollector::new(registry, "billing", "");
        assert_eq!(group_only.metric_name(SHORT_CIRCUITS), "billing.shortCircuits");
    }

    #[test]
    fn test_update_records_counters_and_timers() {
        let registry = Arc::new(MetricRegistry::new());
        let named = NamedMetricCollector::new(registry.clone(), "billing", "charge");
        let result = MetricResult::from_events(
            &[ExecutionEvent::Timeout, ExecutionEvent::FallbackSuccess],
            Duration::from_millis(120),
            Duration::from_millis(100),
        );
        named.update(&result);
        named.update(&result);

        assert_eq!(registry.get_counter("billing.charge.attempts"), Some(2));
        assert_eq!(registry.get_counter("billing.charge.errors"), Some(2));
        assert_eq!(registry.get_counter("billing.charge.timeouts"), Some(2));
        assert_eq!(registry.get_counter("billing.charge.fallbackSuccesses"), Some(2));
        assert_eq!(registry.get_counter("billing.charge.successes"), None);
        let total = registry.get_timer("billing.charge.totalDuration").unwrap();
        assert_eq!(total.count, 2);
        assert_eq!(total.max_ms, 120);
        assert_eq!(registry.get_timer("billing.charge.runDuration").unwrap().min_ms, 100);
    }

    #[test]
    fn test_kind_conflicts_are_swallowed() {
        let registry = Arc::new(MetricRegistry::new());
        registry
            .update_timer("g.c.attempts", Duration::from_millis(1))
            .unwrap();
        let named = NamedMetricCollector::new(registry.clone(), "g", "c");
        named.update(&MetricResult::from_events(
            &[ExecutionEvent::Success],
            Duration::ZERO,
            Duration::ZERO,
        ));
        assert_eq!(registry.get_counter("g.c.successes"), Some(1));
        assert!(registry.get_counter("g.c.attempts").is_none());
    }
}
