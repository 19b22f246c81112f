//! Logging setup.
//!
//! The engine only emits `tracing` events; front ends call [`init`] once at
//! startup to decide where those events go. The filter comes from
//! `KEEPSAKE_LOG`, then `RUST_LOG`, then [`LogConfig::level`].

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{fmt as layer, prelude::*, EnvFilter};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "KEEPSAKE_LOG";

/// Default verbosity when no filter variable is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Where and how much to log.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Write events to stderr. Without it only spans are recorded.
    pub print: bool,
    pub level: LogLevel,
    /// Include source file and line in each event.
    pub include_location: bool,
}

impl LogConfig {
    /// Print to stderr at `level`.
    pub fn stderr(level: LogLevel) -> Self {
        Self {
            print: true,
            level,
            include_location: false,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }
}

/// Install the global subscriber.
///
/// Returns `false` if one was already installed.
pub fn init(config: LogConfig) -> bool {
    let registry = tracing_subscriber::registry().with(config.filter());

    if !config.print {
        return registry.try_init().is_ok();
    }

    let output = layer::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location);
    registry.with(output).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" debug ".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }

    #[test]
    fn test_default_config_is_quiet() {
        let config = LogConfig::default();
        assert!(!config.print);
        assert_eq!(config.level, LogLevel::Info);
        assert!(LogConfig::stderr(LogLevel::Debug).print);
    }

    #[test]
    fn test_init_only_once() {
        let _ = init(LogConfig::default());
        assert!(!init(LogConfig::default()));
    }
}
