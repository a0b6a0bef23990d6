//! Standardized logging setup for binaries embedding the workspace
//! engine.
//!
//! The engine's own crates only ever emit `tracing` events; they never
//! install a global subscriber themselves (a library installing a global
//! subscriber would fight with whatever the embedding binary wants).
//! This module is the opt-in helper an embedding `main()` calls once.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log verbosity levels exposed to embedders, independent of `tracing`'s
/// own `Level` so callers don't need the `tracing` crate in scope just to
/// pick a verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Only warnings and errors.
    Warn,
    /// Coarse operational messages (module loads, processor application).
    Info,
    /// Per-file and per-fetcher detail.
    Debug,
    /// Every dispatch decision and render-chain push/pop.
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration for [`init`].
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The default level applied when `RUST_LOG` is unset.
    pub default_level: LogLevel,
    /// Emit structured JSON instead of the default human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Builds a config at the given default level.
    pub fn new(default_level: LogLevel) -> Self {
        Self {
            default_level,
            ..Default::default()
        }
    }

    /// Switches to JSON-formatted output.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Installs a global `tracing` subscriber honoring `RUST_LOG`, falling
/// back to `config.default_level` when the environment variable is
/// unset. Intended to be called once, by a binary's `main()`; the
/// engine's own crates never call this.
pub fn init(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_level.as_str()));

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_strings_are_lowercase_directives() {
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::Trace.as_str(), "trace");
    }

    #[test]
    fn default_config_is_info_and_text() {
        let config = LoggingConfig::default();
        assert_eq!(config.default_level, LogLevel::Info);
        assert!(!config.json);
    }
}
