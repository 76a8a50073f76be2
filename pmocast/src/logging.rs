//! Global `tracing` subscriber set up from the `host.logger` section.

use std::sync::{Arc, RwLock};

use pmoconfig::Config;
use tracing::{Level, info, warn};
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

use crate::errors::CastError;

/// Runtime control over the installed subscriber.
#[derive(Clone)]
pub struct LogHandle {
    reload_handle: reload::Handle<LevelFilter, Registry>,
    level: Arc<RwLock<Level>>,
}

impl LogHandle {
    pub fn max_level(&self) -> Level {
        *self
            .level
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Changes the level filter of the running subscriber.
    pub fn set_max_level(&self, level: Level) {
        if let Err(e) = self.reload_handle.reload(LevelFilter::from_level(level)) {
            warn!("Failed to reload log level filter: {}", e);
            return;
        }
        *self
            .level
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = level;
        info!("Log level set to {}", level);
    }
}

/// Installs the global subscriber: a reloadable level filter and, when
/// `host.logger.enable_console` is set, a console formatter.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &Config) -> Result<LogHandle, CastError> {
    let level = parse_level(&config.get_log_min_level()).unwrap_or(Level::INFO);
    let (filter, reload_handle) = reload::Layer::new(LevelFilter::from_level(level));

    let enable_console = config.get_log_enable_console().unwrap_or(true);
    let console = enable_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
    });

    Registry::default()
        .with(filter)
        .with(console)
        .try_init()
        .map_err(|e| CastError::Config(format!("cannot install logger: {}", e)))?;

    Ok(LogHandle {
        reload_handle,
        level: Arc::new(RwLock::new(level)),
    })
}

/// Parses a level name, case-insensitively. `WARNING` is accepted.
pub fn parse_level(raw: &str) -> Option<Level> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" => Some(Level::ERROR),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level(" Warning "), Some(Level::WARN));
        assert_eq!(parse_level("verbose"), None);
    }
}
