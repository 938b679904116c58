//! Tracing setup

use crate::config::LoggingConfig;
use crate::error::{NewsroomError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, else the configured directive
///
/// # Errors
/// Returns [`NewsroomError::Config`] if the configured directive is invalid.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| NewsroomError::Config(format!("invalid log filter '{}': {e}", config.filter))),
    }
}

/// Install the global subscriber
///
/// Call once at process start.
///
/// # Errors
/// Returns [`NewsroomError::Config`] for an invalid filter or if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.map_err(|e| NewsroomError::Config(format!("tracing already initialized: {e}")))?;
    tracing::debug!("Tracing initialized (json: {})", config.json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_directive_is_config_error() {
        let config = LoggingConfig {
            filter: "[[[".to_string(),
            json: false,
        };
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(env_filter(&config), Err(NewsroomError::Config(_))));
        }
    }

    #[test]
    fn default_directive_parses() {
        assert!(env_filter(&LoggingConfig::default()).is_ok());
    }
}
