//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber once per process
//! - Pick the log level from `RUST_LOG`, falling back to config
//!
//! # Design Decisions
//! - JSON format for production, human-readable format for development
//! - Initialization is fallible instead of panicking so tests and embedders
//!   that already installed a subscriber keep theirs

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Filter directives used when `RUST_LOG` is unset.
///
/// A bare level applies to this crate and `tower_http`; anything containing
/// `=` is taken as a full directive list.
pub fn default_directives(config: &LoggingConfig) -> String {
    if config.level.contains('=') {
        config.level.clone()
    } else {
        format!("portico={level},tower_http={level}", level = config.level)
    }
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives(config).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_follow_level() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            json: false,
        };
        assert_eq!(default_directives(&config), "portico=debug,tower_http=debug");

        let config = LoggingConfig {
            level: "portico=trace,hyper=warn".to_string(),
            json: true,
        };
        assert_eq!(default_directives(&config), "portico=trace,hyper=warn");
    }

    #[test]
    fn test_second_init_is_an_error() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
