use serde::Deserialize;
use std::time::Duration;
use crate::module::Result;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_liveness_window_secs")]
    pub liveness_window_secs: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_listen_addr() -> String { "127.0.0.1:7070".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_liveness_window_secs() -> u64 { 30 }
fn default_sweep_interval_ms() -> u64 { 5_000 }

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            debug: false,
            log_level: default_log_level(),
            liveness_window_secs: default_liveness_window_secs(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl Config {
    pub fn liveness_window(&self) -> Duration {
        Duration::from_secs(self.liveness_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Log level after applying `debug`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug { "debug" } else { &self.log_level }
    }
}

/// Load configuration from `SENTINEL_CONFIG` (TOML) if set, otherwise `sentinel.toml`.
/// A missing file yields defaults.
pub fn load_config() -> Result<Config> {
    let config_path = std::env::var("SENTINEL_CONFIG").unwrap_or_else(|_| "sentinel.toml".into());
    load_config_from(&config_path)
}

pub fn load_config_from<P: AsRef<std::path::Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&content)?;
    if cfg.sweep_interval_ms == 0 {
        return Err("sweep_interval_ms must be greater than zero".into());
    }
    Ok(cfg)
}
