use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::LoggingCfg;

/// Installs the global fmt subscriber. `RUST_LOG` wins over `level`; an
/// unparsable level falls back to `info`. Later calls are no-ops.
pub fn init_logging(level: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
    tracing::info!(target: "app", "tracing initialized");
}

/// [`init_logging`] at the level from the `logging` config section.
pub fn init_logging_from(cfg: &LoggingCfg) {
    init_logging(&cfg.log_level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("debug");
        init_logging("not a level[");
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn test_init_logging_from_config_section() {
        let cfg: crate::core::config::TelemetryConfig =
            serde_json::from_str(r#"{"logging":{"logLevel":"warn"}}"#).unwrap();
        assert_eq!(cfg.logging.log_level, "warn");
        init_logging_from(&cfg.logging);
        assert!(tracing::dispatcher::has_been_set());
    }
}
