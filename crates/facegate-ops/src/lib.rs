//! Operational helpers: logging setup and asset directories.

use std::path::{Path, PathBuf};

use facegate_types::{config::OpsConfig, FacegateError, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Directive used when the configured level does not parse.
pub const FALLBACK_LEVEL: &str = "info";

pub fn log_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new(FALLBACK_LEVEL))
        .map_err(|err| ops_error(format!("failed to create log filter: {err}")))
}

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = log_filter(&config.log_level)?;
    let builder = fmt().with_env_filter(filter).with_target(false);
    let installed = if config.compact_logs {
        builder.compact().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| ops_error(format!("tracing init error: {err}")))
}

/// Creates `path` if missing. A file sitting where the directory should be
/// is an error.
pub fn ensure_asset_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = path.as_ref().to_path_buf();
    if dir.is_file() {
        return Err(ops_error(format!("{} exists and is not a directory", dir.display())));
    }
    if !dir.exists() {
        warn!("Asset directory {:?} missing; creating it empty", dir);
    }
    std::fs::create_dir_all(&dir)
        .map_err(|err| ops_error(format!("failed to create asset dir {}: {err}", dir.display())))?;
    info!("Asset directory ready at {:?}", dir);
    Ok(dir)
}

pub fn ops_error(message: impl Into<String>) -> FacegateError {
    FacegateError::Ops(message.into())
}
