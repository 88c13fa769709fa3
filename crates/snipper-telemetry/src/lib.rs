//! Logging setup shared by the Snipper binaries.

use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use typed_builder::TypedBuilder;

pub type Result<T> = std::result::Result<T, TelemetryError>;

#[derive(Debug, Clone, Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{0}': {1}")]
    Filter(String, String),
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct TelemetryConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[builder(default = "info".to_string(), setter(into))]
    pub level: String,
    #[builder(default)]
    pub format: LogFormat,
}

/// Parses `level` as an [`EnvFilter`] directive, ignoring `RUST_LOG`.
pub fn filter_for(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| TelemetryError::Filter(level.to_string(), e.to_string()))
}

/// Installs the global subscriber and routes `log` records into it.
///
/// Call once, before anything logs.
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_for(&config.level)?,
    };

    tracing_log::LogTracer::init().map_err(|e| TelemetryError::Install(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = match config.format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    installed.map_err(|e| TelemetryError::Install(e.to_string()))?;

    tracing::debug!(level = %config.level, format = %config.format, "telemetry initialised");
    Ok(())
}
