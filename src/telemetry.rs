use tracing_subscriber::{fmt, filter::EnvFilter};
use crate::config::Config;
use crate::module::Result;

/// Initialize global logging based on env or config.
/// Order: SENTINEL_LOG env -> cfg.debug -> cfg.log_level -> "info"
pub fn init_telemetry(cfg: &Config) -> Result<()> {
    let filter = filter_for(std::env::var("SENTINEL_LOG").ok(), cfg);

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(cfg.debug)
        .try_init();

    tracing::info!(debug = cfg.debug, "telemetry initialized");
    Ok(())
}

fn filter_for(from_env: Option<String>, cfg: &Config) -> EnvFilter {
    match from_env {
        Some(s) => EnvFilter::try_new(s),
        None => EnvFilter::try_new(cfg.effective_log_level()),
    }
    .unwrap_or_else(|_| EnvFilter::new("info"))
}
