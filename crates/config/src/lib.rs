//! cdnet Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid configuration: a plain-text client talking to
//! `127.0.0.1:25826` and a server listening on `0.0.0.0:25826`.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use cdnet_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[server]\nport = 25827").unwrap();
//! assert_eq!(config.server.port, 25827);
//! ```
//!
//! # Example Full Config
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "console"
//!
//! [client]
//! server = "127.0.0.1:25826"
//! buffer_size = 1452
//! security_level = "sign"
//! username = "alice"
//! password = "secret"
//! flush_interval = "10s"
//!
//! [server]
//! address = "0.0.0.0"
//! port = 25826
//! security_level = "encrypt"
//! auth_file = "/etc/collectd/passwd"
//! max_packet_size = 1452
//! ```

mod client;
mod error;
mod logging;
mod server;
mod validation;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use client::ClientConfig;
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use server::ServerConfig;

use serde::Deserialize;

/// Default collectd network port
pub const DEFAULT_PORT: u16 = 25826;

/// Default packet size in bytes
pub const DEFAULT_PACKET_SIZE: usize = 1452;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Outgoing client (used by `send` and `relay`)
    pub client: ClientConfig,

    /// Receiving server (used by `listen` and `relay`)
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Checks for:
    /// - Credentials present when the client signs or encrypts
    /// - An auth file when the server requires signing or encryption
    /// - Packet sizes large enough to hold a value list
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Packet security level
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Plain text (default)
    #[default]
    None,
    /// HMAC-SHA256 signature
    Sign,
    /// AES-256 encryption
    Encrypt,
}

impl SecurityLevel {
    /// Get the string name of this level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sign => "sign",
            Self::Encrypt => "encrypt",
        }
    }

    /// Check if credentials are involved
    pub fn is_secured(&self) -> bool {
        *self != Self::None
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
