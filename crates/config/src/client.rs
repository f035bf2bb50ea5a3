//! Client configuration

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::{DEFAULT_PACKET_SIZE, DEFAULT_PORT, SecurityLevel};

/// Outgoing client configuration
///
/// # Example
///
/// ```toml
/// [client]
/// server = "127.0.0.1:25826"
/// buffer_size = 1452
/// security_level = "encrypt"
/// username = "alice"
/// password = "secret"
/// flush_interval = "10s"
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address as `host:port`
    /// Default: 127.0.0.1:25826
    pub server: String,

    /// Maximum datagram size in bytes
    /// Default: 1452
    pub buffer_size: usize,

    /// Security applied to outgoing datagrams (none, sign, encrypt)
    /// Default: none
    pub security_level: SecurityLevel,

    /// Username for signing/encryption
    pub username: String,

    /// Password for signing/encryption
    pub password: String,

    /// How often `relay` flushes a partially filled buffer
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{DEFAULT_PORT}"),
            buffer_size: DEFAULT_PACKET_SIZE,
            security_level: SecurityLevel::None,
            username: String::new(),
            password: String::new(),
            flush_interval: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server", &self.server)
            .field("buffer_size", &self.buffer_size)
            .field("security_level", &self.security_level)
            .field("username", &self.username)
            .field("flush_interval", &self.flush_interval)
            .finish_non_exhaustive()
    }
}
