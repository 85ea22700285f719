use std::fmt::Write as _;
use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::error::ExportError;
use super::registry::{MetricRegistry, RegistrySnapshot};

/// Plaintext `"{path} {value} {epoch}"` lines, one per exported value.
pub fn encode_plaintext(snapshot: &RegistrySnapshot, prefix: &str, epoch_secs: i64) -> String {
    let mut out = String::new();
    for counter in &snapshot.counters {
        push_line(&mut out, prefix, &counter.name, "count", counter.count, epoch_secs);
    }
    for timer in &snapshot.timers {
        let name = timer.name.as_str();
        push_line(&mut out, prefix, name, "count", timer.count, epoch_secs);
        push_line(&mut out, prefix, name, "min", timer.min_ms, epoch_secs);
        push_line(&mut out, prefix, name, "max", timer.max_ms, epoch_secs);
        push_line(&mut out, prefix, name, "mean", format_args!("{:.2}", timer.mean_ms), epoch_secs);
        push_line(&mut out, prefix, name, "50-percentile", timer.p50_ms, epoch_secs);
        push_line(&mut out, prefix, name, "75-percentile", timer.p75_ms, epoch_secs);
        push_line(&mut out, prefix, name, "95-percentile", timer.p95_ms, epoch_secs);
        push_line(&mut out, prefix, name, "99-percentile", timer.p99_ms, epoch_secs);
        push_line(&mut out, prefix, name, "999-percentile", timer.p999_ms, epoch_secs);
    }
    out
}

pub fn encode_json(snapshot: &RegistrySnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(snapshot)
}

fn push_line(
    out: &mut String,
    prefix: &str,
    name: &str,
    field: &str,
    value: impl std::fmt::Display,
    epoch_secs: i64,
) {
    if prefix.is_empty() {
        let _ = writeln!(out, "{name}.{field} {value} {epoch_secs}");
    } else {
        let _ = writeln!(out, "{prefix}.{name}.{field} {value} {epoch_secs}");
    }
}

/// Writes one encoded snapshot to `sink`. An empty registry writes nothing.
pub fn report_once<W: Write + ?Sized>(
    registry: &MetricRegistry,
    prefix: &str,
    clock: &dyn Clock,
    sink: &mut W,
) -> Result<usize, ExportError> {
    let snapshot = registry.snapshot();
    if snapshot.is_empty() {
        return Ok(0);
    }
    let payload = encode_plaintext(&snapshot, prefix, clock.now_secs());
    sink.write_all(payload.as_bytes())?;
    sink.flush()?;
    Ok(snapshot.counters.len() + snapshot.timers.len())
}

#[derive(Clone)]
pub struct ReporterSettings {
    pub prefix: String,
    pub tick_interval: Duration,
    pub clock: Arc<dyn Clock>,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            tick_interval: Duration::from_secs(10),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Background exporter that reports a registry snapshot every tick.
pub struct Reporter;

impl Reporter {
    pub fn spawn<W>(
        registry: Arc<MetricRegistry>,
        settings: ReporterSettings,
        mut sink: W,
    ) -> Result<ReporterHandle, ExportError>
    where
        W: Write + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let interval = settings.tick_interval.max(Duration::from_millis(1));
        let join = thread::Builder::new()
            .name("metrics-reporter".into())
            .spawn(move || loop {
                let last = match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => false,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                };
                match report_once(&registry, &settings.prefix, settings.clock.as_ref(), &mut sink) {
                    Ok(series) => {
                        debug!(target: "metrics", series, "metrics report written");
                    }
                    Err(err) => {
                        warn!(target: "metrics", error = %err, "failed to write metrics report");
                    }
                }
                if last {
                    break;
                }
            })
            .map_err(|err| ExportError::Spawn(err.to_string()))?;
        Ok(ReporterHandle {
            shutdown_tx,
            join: Some(join),
        })
    }
}

/// Dropping the handle also stops the reporter, after one last report.
pub struct ReporterHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl ReporterHandle {
    /// Stops the reporter and waits for its final report.
    pub fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!(target: "metrics", "metrics reporter thread panicked");
            }
        }
    }
}
