//! Server configuration

use std::net::IpAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::{DEFAULT_PACKET_SIZE, DEFAULT_PORT, SecurityLevel};

/// Receiving server configuration
///
/// # Example
///
/// ```toml
/// [server]
/// address = "0.0.0.0"
/// port = 25826
/// security_level = "sign"
/// auth_file = "/etc/collectd/passwd"
/// max_packet_size = 1452
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    /// Default: 0.0.0.0
    pub address: String,

    /// Listen port
    /// Default: 25826
    pub port: u16,

    /// Minimum security level accepted (none, sign, encrypt)
    /// Default: none
    pub security_level: SecurityLevel,

    /// `user: password` file used to verify and decrypt packets
    pub auth_file: Option<PathBuf>,

    /// Largest datagram accepted
    /// Default: 1452
    pub max_packet_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            security_level: SecurityLevel::None,
            auth_file: None,
            max_packet_size: DEFAULT_PACKET_SIZE,
        }
    }
}

impl ServerConfig {
    /// Get the socket address to bind to
    ///
    /// IPv6 literals are bracketed.
    pub fn bind_address(&self) -> String {
        match self.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{}]:{}", self.address, self.port),
            _ => format!("{}:{}", self.address, self.port),
        }
    }
}
