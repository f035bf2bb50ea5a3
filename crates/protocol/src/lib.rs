//! cdnet Protocol - collectd binary network protocol
//!
//! This crate implements the wire format spoken by collectd's `network`
//! plugin:
//! - `ValueList` / `Identifier` / `Value` - the sample data model
//! - `CdTime` - collectd's 2^30 fixed-point time representation
//! - `Buffer` - size-bounded, diffing encoder with optional signing/encryption
//! - `parse` - packet decoder, including signature checks and decryption
//! - `PasswordLookup` / `AuthFile` - credentials for the receiving side
//!
//! # Wire Format
//!
//! A packet is a sequence of parts, each framed as:
//!
//! ```text
//! [2 bytes: part type (BE)][2 bytes: part length incl. header (BE)][payload]
//! ```
//!
//! Identifier, time and interval parts are only emitted when they change
//! from the previous value list in the same packet. Every value list ends
//! with a values part.
//!
//! # Example
//!
//! ```
//! use cdnet_protocol::{Buffer, Identifier, Value, ValueList};
//! use std::time::Duration;
//!
//! let buffer = Buffer::new(1452);
//! let vl = ValueList::new(Identifier::new("web-01", "cpu", "gauge"))
//!     .with_interval(Duration::from_secs(10))
//!     .with_values(vec![Value::Gauge(42.5)]);
//!
//! buffer.write(&vl).unwrap();
//! let packet = buffer.bytes().unwrap();
//! assert!(!packet.is_empty());
//! ```

mod auth;
mod buffer;
mod cdtime;
mod crypto;
mod decode;
mod encode;
mod error;
mod types;
mod writer;

pub use auth::{AuthFile, PasswordLookup, StaticPasswords};
pub use buffer::Buffer;
pub use cdtime::CdTime;
pub use crypto::{decrypt_aes256, encrypt_aes256, sign_sha256, verify_sha256};
pub use decode::{ParseOptions, parse};
pub use encode::{CANONICAL_NAN_BITS, PartWriter};
pub use error::ProtocolError;
pub use types::{Identifier, SecurityLevel, Value, ValueList};
pub use writer::Writer;

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Default UDP port used by collectd's network plugin
pub const DEFAULT_PORT: u16 = 25826;

/// Default IPv4 multicast group
pub const DEFAULT_IPV4_ADDRESS: &str = "239.192.74.66";

/// Default IPv6 multicast group
pub const DEFAULT_IPV6_ADDRESS: &str = "ff18::efc0:4a42";

/// Default buffer capacity in bytes
///
/// The largest UDP payload that fits into an Ethernet frame without
/// fragmentation (1500 MTU minus IPv6 and UDP headers).
pub const DEFAULT_BUFFER_SIZE: usize = 1452;

/// Part type codes
pub mod part {
    pub const HOST: u16 = 0x0000;
    pub const TIME: u16 = 0x0001;
    pub const PLUGIN: u16 = 0x0002;
    pub const PLUGIN_INSTANCE: u16 = 0x0003;
    pub const TYPE: u16 = 0x0004;
    pub const TYPE_INSTANCE: u16 = 0x0005;
    pub const VALUES: u16 = 0x0006;
    pub const INTERVAL: u16 = 0x0007;
    pub const TIME_HR: u16 = 0x0008;
    pub const INTERVAL_HR: u16 = 0x0009;
    pub const MESSAGE: u16 = 0x0100;
    pub const SEVERITY: u16 = 0x0101;
    pub const SIGN_SHA256: u16 = 0x0200;
    pub const ENCRYPT_AES256: u16 = 0x0210;
}

/// Data source type codes used inside a values part
pub mod ds_type {
    pub const COUNTER: u8 = 0;
    pub const GAUGE: u8 = 1;
    pub const DERIVE: u8 = 2;
    pub const ABSOLUTE: u8 = 3;
}

#[cfg(test)]
mod decode_test;
