//! Packet decoding
//!
//! Turns a received datagram back into value lists. The decoder keeps a
//! running value list: string, time and interval parts update it, and every
//! values part emits a copy of it carrying those values.
//!
//! # Security
//!
//! With a password lookup configured, a signature part is verified against
//! the remainder of the packet and an encryption part is decrypted and its
//! plain text parsed. Value lists are tagged with the level they arrived at;
//! those below `ParseOptions::security_level` are dropped. Without a lookup,
//! signed data is parsed unverified (level `None`) and encrypted parts are
//! skipped. A signature or encryption part inside already verified or
//! decrypted data is rejected.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;

use crate::crypto::{decrypt_aes256, verify_sha256};
use crate::encode::PART_HEADER_SIZE;
use crate::{
    CdTime, Identifier, PasswordLookup, ProtocolError, Result, SecurityLevel, Value, ValueList,
    ds_type, part,
};

/// Options for [`parse`]
#[derive(Clone, Default)]
pub struct ParseOptions {
    /// Minimum security level a value list must arrive at
    pub security_level: SecurityLevel,

    /// Passwords for signed and encrypted packets
    pub password_lookup: Option<Arc<dyn PasswordLookup>>,
}

impl ParseOptions {
    /// Accept everything, verify nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a minimum security level
    #[must_use]
    pub fn with_security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    /// Verify and decrypt using `lookup`
    #[must_use]
    pub fn with_password_lookup(mut self, lookup: Arc<dyn PasswordLookup>) -> Self {
        self.password_lookup = Some(lookup);
        self
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("security_level", &self.security_level)
            .field("password_lookup", &self.password_lookup.is_some())
            .finish()
    }
}

/// Decode all value lists in `packet`
///
/// # Errors
///
/// Returns an error for malformed parts, unsupported value types and
/// failed signature or decryption checks. Nothing is returned from a packet
/// that fails part way.
pub fn parse(packet: &[u8], opts: &ParseOptions) -> Result<Vec<ValueList>> {
    let mut out = Vec::new();
    parse_parts(packet, SecurityLevel::None, opts, &mut out)?;
    Ok(out)
}

fn parse_parts(
    mut buf: &[u8],
    mut level: SecurityLevel,
    opts: &ParseOptions,
    out: &mut Vec<ValueList>,
) -> Result<()> {
    let mut state = ValueList {
        identifier: Identifier::default(),
        time: DateTime::UNIX_EPOCH,
        interval: Duration::ZERO,
        values: Vec::new(),
    };

    while !buf.is_empty() {
        if buf.len() < PART_HEADER_SIZE {
            return Err(ProtocolError::invalid_part(
                read_u16(buf).unwrap_or(u16::MAX),
                format!("truncated header ({} bytes left)", buf.len()),
            ));
        }
        let part_type = u16::from_be_bytes([buf[0], buf[1]]);
        let part_len = usize::from(u16::from_be_bytes([buf[2], buf[3]]));
        if part_len < PART_HEADER_SIZE || part_len > buf.len() {
            return Err(ProtocolError::invalid_part(
                part_type,
                format!("invalid length {part_len} ({} bytes left)", buf.len()),
            ));
        }

        let payload = &buf[PART_HEADER_SIZE..part_len];
        let rest = &buf[part_len..];

        match part_type {
            part::HOST => state.identifier.host = parse_string(part_type, payload)?,
            part::PLUGIN => state.identifier.plugin = parse_string(part_type, payload)?,
            part::PLUGIN_INSTANCE => {
                state.identifier.plugin_instance = parse_string(part_type, payload)?;
            }
            part::TYPE => state.identifier.type_ = parse_string(part_type, payload)?,
            part::TYPE_INSTANCE => {
                state.identifier.type_instance = parse_string(part_type, payload)?;
            }
            part::TIME => {
                let secs = parse_u64(part_type, payload)?;
                state.time = CdTime::from_seconds(secs).to_datetime();
            }
            part::TIME_HR => {
                let raw = parse_u64(part_type, payload)?;
                state.time = CdTime::from_raw(raw).to_datetime();
            }
            part::INTERVAL => {
                let secs = parse_u64(part_type, payload)?;
                state.interval = Duration::from_secs(secs);
            }
            part::INTERVAL_HR => {
                let raw = parse_u64(part_type, payload)?;
                state.interval = CdTime::from_raw(raw).to_duration();
            }
            part::VALUES => {
                let values = parse_values(payload)?;
                if level >= opts.security_level {
                    out.push(ValueList {
                        values,
                        ..state.clone()
                    });
                } else {
                    tracing::debug!(
                        identifier = %state.identifier,
                        level = %level,
                        required = %opts.security_level,
                        "dropping value list below required security level"
                    );
                }
            }
            part::SIGN_SHA256 | part::ENCRYPT_AES256 if level > SecurityLevel::None => {
                return Err(ProtocolError::invalid_part(
                    part_type,
                    format!("nested inside {level} data"),
                ));
            }
            part::SIGN_SHA256 => {
                // The signature covers everything after it
                if let Some(lookup) = &opts.password_lookup {
                    let username = verify_sha256(payload, rest, lookup.as_ref())?;
                    tracing::trace!(%username, "signature verified");
                    level = SecurityLevel::Sign;
                }
            }
            part::ENCRYPT_AES256 => match &opts.password_lookup {
                Some(lookup) => {
                    let (username, plain) = decrypt_aes256(payload, lookup.as_ref())?;
                    tracing::trace!(%username, bytes = plain.len(), "packet decrypted");
                    // Nested envelopes are rejected, so this recurses once at most
                    parse_parts(&plain, SecurityLevel::Encrypt, opts, out)?;
                }
                None => {
                    tracing::debug!("skipping encrypted part: no password lookup configured");
                }
            },
            _ => {
                tracing::trace!(part_type, part_len, "skipping unsupported part");
            }
        }

        buf = rest;
    }

    Ok(())
}

fn read_u16(buf: &[u8]) -> Option<u16> {
    match buf {
        [a, b, ..] => Some(u16::from_be_bytes([*a, *b])),
        _ => None,
    }
}

/// NUL terminated UTF-8 string
fn parse_string(part_type: u16, payload: &[u8]) -> Result<String> {
    match payload.split_last() {
        Some((0, bytes)) => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| ProtocolError::InvalidString(part_type)),
        _ => Err(ProtocolError::InvalidString(part_type)),
    }
}

/// Big-endian u64
fn parse_u64(part_type: u16, payload: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = payload.try_into().map_err(|_| {
        ProtocolError::invalid_part(part_type, format!("expected 8 bytes, got {}", payload.len()))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

/// `[count u16][count type bytes][count x 8 byte payloads]`
fn parse_values(payload: &[u8]) -> Result<Vec<Value>> {
    let count = read_u16(payload)
        .map(usize::from)
        .ok_or_else(|| ProtocolError::invalid_part(part::VALUES, "missing value count"))?;

    let expected = 2 + 9 * count;
    if payload.len() != expected {
        return Err(ProtocolError::invalid_part(
            part::VALUES,
            format!("{count} values need {expected} bytes, got {}", payload.len()),
        ));
    }

    let (types, data) = payload[2..].split_at(count);
    types
        .iter()
        .zip(data.chunks_exact(8))
        .map(|(&ds, chunk)| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            match ds {
                ds_type::GAUGE => Ok(Value::Gauge(f64::from_le_bytes(bytes))),
                ds_type::DERIVE => Ok(Value::Derive(i64::from_be_bytes(bytes))),
                ds_type::COUNTER => Ok(Value::Counter(u64::from_be_bytes(bytes))),
                other => Err(ProtocolError::UnknownType(other)),
            }
        })
        .collect()
}
