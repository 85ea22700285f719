use anyhow::{Context, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use super::model::TelemetryConfig;

fn join_default_path(base: &Path) -> PathBuf {
    let mut p = base.to_path_buf();
    p.push("config");
    p.push("telemetry.json");
    p
}

/// Reads `<base_dir>/config/telemetry.json`, writing the defaults there first
/// when the file does not exist.
pub fn load_or_init_at(base_dir: &Path) -> Result<TelemetryConfig> {
    let path = join_default_path(base_dir);
    load_or_init_at_path(&path)
}

pub fn save_at(cfg: &TelemetryConfig, base_dir: &Path) -> Result<()> {
    let path = join_default_path(base_dir);
    save_at_path(cfg, &path)
}

fn load_or_init_at_path(path: &Path) -> Result<TelemetryConfig> {
    if path.exists() {
        let data = fs::read(path).with_context(|| format!("read config: {}", path.display()))?;
        let cfg: TelemetryConfig = serde_json::from_slice(&data).context("parse config json")?;
        tracing::debug!(target: "config", path = %path.display(), "config loaded");
        Ok(cfg)
    } else {
        let cfg = TelemetryConfig::default();
        save_at_path(&cfg, path)?;
        Ok(cfg)
    }
}

fn save_at_path(cfg: &TelemetryConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("create config dir: {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(cfg).context("serialize config")?;
    let mut f =
        fs::File::create(path).with_context(|| format!("create config: {}", path.display()))?;
    f.write_all(json.as_bytes()).context("write config")?;
    tracing::info!(target: "config", path = %path.display(), "config saved");
    Ok(())
}
