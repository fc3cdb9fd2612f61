//! Logging setup
//!
//! One `tracing` registry with a fmt layer. `RUST_LOG` wins over the
//! configured level when it is set.

use std::fmt;

use tracing_subscriber::{fmt as fmt_layer, prelude::*, EnvFilter};

use crate::utils::error::{MpoxError, Result};

/// GPU runtimes log every kernel compilation at info
const QUIET_TARGETS: &[&str] = &["wgpu_core=warn", "wgpu_hal=warn", "cubecl=warn", "naga=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Unknown names fall back to `Info`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    fn directive(self) -> &'static str {
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
        write!(f, "{}", self.directive())
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Print the module path of each event
    pub with_target: bool,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::with_level(LogLevel::Info)
    }
}

impl LogConfig {
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level,
            with_target: false,
            ansi: true,
        }
    }

    /// Debug level with module paths
    pub fn verbose() -> Self {
        Self {
            with_target: true,
            ..Self::with_level(LogLevel::Debug)
        }
    }

    /// Warnings and errors only
    pub fn quiet() -> Self {
        Self::with_level(LogLevel::Warn)
    }

    /// Filter built from the configured level plus the quiet GPU targets
    pub fn filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::new(self.level.directive());
        for target in QUIET_TARGETS {
            if let Ok(directive) = target.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.filter());

    tracing_subscriber::registry()
        .with(
            fmt_layer::layer()
                .compact()
                .with_target(config.with_target)
                .with_ansi(config.ansi),
        )
        .with(filter)
        .try_init()
        .map_err(|e| MpoxError::Config(format!("Failed to initialize logger: {e}")))?;

    Ok(())
}
