//! Tracing Subscriber Initialization
//!
//! Installs an `EnvFilter` plus one `fmt` layer, JSON for log shippers or
//! pretty for a terminal.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,quill_api=debug";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// `pretty` selects human-readable output; anything else is JSON.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Log line format (`QUILL_LOG_FORMAT`)
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("QUILL_SERVICE_NAME")
                .unwrap_or_else(|_| "quill-api".to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_format: std::env::var("QUILL_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(LogFormat::Json),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup, before anything logs.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        service_version = %config.service_version,
        log_format = ?config.log_format,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(" TEXT "), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("bogus"), LogFormat::Json);
    }

    #[test]
    fn test_telemetry_config_default_name() {
        let config = TelemetryConfig::default();
        assert!(!config.service_version.is_empty());
    }
}
