//! Configuration validation
//!
//! Validates config consistency:
//! - A signing/encrypting client has a username and password
//! - A server requiring signing/encryption has an auth file
//! - Packet sizes can hold at least one small value list

use crate::Config;
use crate::error::{ConfigError, Result};

/// Smallest usable packet size
pub const MIN_PACKET_SIZE: usize = 64;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_client(config)?;
    validate_server(config)?;
    Ok(())
}

fn validate_client(config: &Config) -> Result<()> {
    let client = &config.client;

    if client.server.is_empty() {
        return Err(ConfigError::missing_field(
            "client",
            "server",
            "an address is required",
        ));
    }

    if client.buffer_size < MIN_PACKET_SIZE {
        return Err(ConfigError::invalid_value(
            "client",
            "buffer_size",
            format!("{} is below the minimum of {MIN_PACKET_SIZE}", client.buffer_size),
        ));
    }

    if client.security_level.is_secured() {
        let reason = format!("security_level is {}", client.security_level);
        if client.username.is_empty() {
            return Err(ConfigError::missing_field("client", "username", reason));
        }
        if client.password.is_empty() {
            return Err(ConfigError::missing_field("client", "password", reason));
        }
    }

    if client.flush_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "client",
            "flush_interval",
            "must be greater than zero",
        ));
    }

    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    let server = &config.server;

    if server.max_packet_size < MIN_PACKET_SIZE {
        return Err(ConfigError::invalid_value(
            "server",
            "max_packet_size",
            format!(
                "{} is below the minimum of {MIN_PACKET_SIZE}",
                server.max_packet_size
            ),
        ));
    }

    if server.security_level.is_secured() && server.auth_file.is_none() {
        return Err(ConfigError::missing_field(
            "server",
            "auth_file",
            format!("security_level is {}", server.security_level),
        ));
    }

    Ok(())
}
