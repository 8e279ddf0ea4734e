//! Tracing subscriber setup

use crate::config::LoggingConfig;
use crate::error::{MailError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| MailError::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        other => {
            return Err(MailError::Config(format!(
                "Unknown log format '{}', expected 'pretty' or 'json'",
                other
            )))
        }
    };

    result.map_err(|e| MailError::Config(format!("Failed to set tracing subscriber: {}", e)))
}
