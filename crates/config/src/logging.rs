//! `[log]` section
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "json"
//! # Per-target overrides, in tracing's EnvFilter syntax
//! directives = ["cdnet_sources=debug"]
//! ```
//!
//! Output always goes to stderr; `cdnet listen` owns stdout.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Minimum severity that is logged
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
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
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!(
                "unknown log level '{other}' (expected trace, debug, info, warn or error)"
            )),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Console,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Extra `target=level` directives appended after the base level
    pub directives: Vec<String>,
}

impl LogConfig {
    /// Build an EnvFilter string, with `level` overriding the configured one
    pub fn filter(&self, level: Option<LogLevel>) -> String {
        let level = level.unwrap_or(self.level);
        std::iter::once(level.as_str())
            .chain(self.directives.iter().map(String::as_str).filter(|d| !d.is_empty()))
            .collect::<Vec<_>>()
            .join(",")
    }
}
