//! Tests for the packet decoder

use std::sync::Arc;
use std::time::Duration;

use bytes::BufMut;
use chrono::DateTime;

use crate::crypto::{encrypt_aes256, sign_sha256};
use crate::decode::{ParseOptions, parse};
use crate::{
    Buffer, CdTime, DEFAULT_BUFFER_SIZE, Identifier, ProtocolError, SecurityLevel,
    StaticPasswords, Value, ValueList, part,
};

// =============================================================================
// Test Helpers - hand-built parts
// =============================================================================

fn string_part(buf: &mut Vec<u8>, part_type: u16, value: &str) {
    buf.put_u16(part_type);
    buf.put_u16((4 + value.len() + 1) as u16);
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
}

fn numeric_part(buf: &mut Vec<u8>, part_type: u16, value: u64) {
    buf.put_u16(part_type);
    buf.put_u16(12);
    buf.put_u64(value);
}

fn gauge_part(buf: &mut Vec<u8>, value: f64) {
    buf.put_u16(part::VALUES);
    buf.put_u16(15);
    buf.put_u16(1);
    buf.put_u8(1);
    buf.put_f64_le(value);
}

fn identified_packet() -> Vec<u8> {
    let mut buf = Vec::new();
    string_part(&mut buf, part::HOST, "h1");
    string_part(&mut buf, part::PLUGIN, "cpu");
    string_part(&mut buf, part::TYPE, "percent");
    buf
}

fn lookup() -> Arc<StaticPasswords> {
    Arc::new(StaticPasswords::new().with_user("alice", "secret"))
}

fn sample() -> ValueList {
    ValueList::new(Identifier::new("h1", "cpu", "percent"))
        .with_time(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
        .with_interval(Duration::from_secs(10))
        .with_values(vec![Value::Gauge(1.5)])
}

// =============================================================================
// Plain parts
// =============================================================================

#[test]
fn test_parse_empty_packet() {
    let vls = parse(&[], &ParseOptions::new()).unwrap();
    assert!(vls.is_empty());
}

#[test]
fn test_parse_legacy_time_and_interval() {
    let mut buf = identified_packet();
    numeric_part(&mut buf, part::TIME, 1_700_000_000);
    numeric_part(&mut buf, part::INTERVAL, 10);
    gauge_part(&mut buf, 2.5);

    let vls = parse(&buf, &ParseOptions::new()).unwrap();

    assert_eq!(vls.len(), 1);
    let vl = &vls[0];
    assert_eq!(vl.identifier.to_string(), "h1/cpu/percent");
    assert_eq!(vl.time.timestamp(), 1_700_000_000);
    assert_eq!(vl.interval, Duration::from_secs(10));
    assert_eq!(vl.values, vec![Value::Gauge(2.5)]);
}

#[test]
fn test_parse_high_resolution_time() {
    let mut buf = identified_packet();
    numeric_part(&mut buf, part::TIME_HR, (1_700_000_000u64 << 30) | (1 << 29));
    numeric_part(&mut buf, part::INTERVAL_HR, CdTime::from_duration(Duration::from_millis(250)).as_raw());
    gauge_part(&mut buf, 1.0);

    let vls = parse(&buf, &ParseOptions::new()).unwrap();

    assert_eq!(vls[0].time, DateTime::from_timestamp(1_700_000_000, 500_000_000).unwrap());
    assert_eq!(vls[0].interval, Duration::from_millis(250));
}

#[test]
fn test_parse_state_carries_between_value_lists() {
    let mut buf = identified_packet();
    string_part(&mut buf, part::TYPE_INSTANCE, "user");
    gauge_part(&mut buf, 1.0);
    string_part(&mut buf, part::TYPE_INSTANCE, "system");
    gauge_part(&mut buf, 2.0);

    let vls = parse(&buf, &ParseOptions::new()).unwrap();

    assert_eq!(vls.len(), 2);
    assert_eq!(vls[0].identifier.type_instance, "user");
    assert_eq!(vls[1].identifier.type_instance, "system");
    assert_eq!(vls[1].identifier.host, "h1");
    assert_eq!(vls[1].values, vec![Value::Gauge(2.0)]);
}

#[test]
fn test_parse_all_value_kinds() {
    let mut buf = identified_packet();
    buf.put_u16(part::VALUES);
    buf.put_u16(6 + 27);
    buf.put_u16(3);
    buf.put_slice(&[0, 1, 2]);
    buf.put_u64(u64::MAX);
    buf.put_f64_le(-0.5);
    buf.put_i64(-42);

    let vls = parse(&buf, &ParseOptions::new()).unwrap();

    assert_eq!(
        vls[0].values,
        vec![Value::Counter(u64::MAX), Value::Gauge(-0.5), Value::Derive(-42)]
    );
}

#[test]
fn test_parse_skips_unknown_parts() {
    let mut buf = identified_packet();
    string_part(&mut buf, part::MESSAGE, "disk full");
    numeric_part(&mut buf, part::SEVERITY, 1);
    gauge_part(&mut buf, 3.0);

    let vls = parse(&buf, &ParseOptions::new()).unwrap();

    assert_eq!(vls.len(), 1);
}

// =============================================================================
// Malformed input
// =============================================================================

#[test]
fn test_parse_truncated_header() {
    let err = parse(&[0x00, 0x00, 0x00], &ParseOptions::new()).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidPart { part_type: 0, .. }));
}

#[test]
fn test_parse_length_past_end() {
    let mut buf = identified_packet();
    buf.put_u16(part::HOST);
    buf.put_u16(100);
    buf.put_slice(b"x\0");

    let err = parse(&buf, &ParseOptions::new()).unwrap_err();

    assert!(matches!(err, ProtocolError::InvalidPart { part_type: 0, .. }));
}

#[test]
fn test_parse_length_below_header() {
    let err = parse(&[0x00, 0x02, 0x00, 0x03, 0x00], &ParseOptions::new()).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidPart { part_type: 2, .. }));
}

#[test]
fn test_parse_string_without_nul() {
    let buf = [0x00, 0x00, 0x00, 0x06, b'h', b'1'];

    let err = parse(&buf, &ParseOptions::new()).unwrap_err();

    assert!(matches!(err, ProtocolError::InvalidString(0)));
}

#[test]
fn test_parse_numeric_wrong_size() {
    let buf = [0x00, 0x08, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01];

    let err = parse(&buf, &ParseOptions::new()).unwrap_err();

    assert!(matches!(err, ProtocolError::InvalidPart { part_type: 8, .. }));
}

#[test]
fn test_parse_values_count_mismatch() {
    let mut buf = Vec::new();
    buf.put_u16(part::VALUES);
    buf.put_u16(15);
    buf.put_u16(2);
    buf.put_u8(1);
    buf.put_f64_le(1.0);

    let err = parse(&buf, &ParseOptions::new()).unwrap_err();

    assert!(matches!(err, ProtocolError::InvalidPart { part_type: 6, .. }));
}

#[test]
fn test_parse_absolute_is_unknown_type() {
    let mut buf = Vec::new();
    buf.put_u16(part::VALUES);
    buf.put_u16(15);
    buf.put_u16(1);
    buf.put_u8(3);
    buf.put_u64(7);

    let err = parse(&buf, &ParseOptions::new()).unwrap_err();

    assert!(matches!(err, ProtocolError::UnknownType(3)));
}

// =============================================================================
// Security
// =============================================================================

#[test]
fn test_plain_packet_dropped_when_signing_required() {
    let buffer = Buffer::new(0);
    buffer.write(&sample()).unwrap();
    let packet = buffer.bytes().unwrap();

    let opts = ParseOptions::new().with_security_level(SecurityLevel::Sign);
    let vls = parse(&packet, &opts).unwrap();

    assert!(vls.is_empty());
}

#[test]
fn test_signed_packet_verified() {
    let buffer = Buffer::new(0);
    buffer.sign("alice", "secret");
    buffer.write(&sample()).unwrap();
    let packet = buffer.bytes().unwrap();

    let opts = ParseOptions::new()
        .with_security_level(SecurityLevel::Sign)
        .with_password_lookup(lookup());
    let vls = parse(&packet, &opts).unwrap();

    assert_eq!(vls, vec![sample()]);
}

#[test]
fn test_signed_packet_bad_signature() {
    let mut plain = identified_packet();
    gauge_part(&mut plain, 1.0);
    let packet = sign_sha256(&plain, "alice", "wrong").unwrap();

    let opts = ParseOptions::new().with_password_lookup(lookup());
    let err = parse(&packet, &opts).unwrap_err();

    assert!(matches!(err, ProtocolError::SignatureMismatch(_)));
}

#[test]
fn test_signed_packet_without_lookup_is_unverified() {
    let mut plain = identified_packet();
    gauge_part(&mut plain, 1.0);
    let packet = sign_sha256(&plain, "alice", "whatever").unwrap();

    assert_eq!(parse(&packet, &ParseOptions::new()).unwrap().len(), 1);

    let strict = ParseOptions::new().with_security_level(SecurityLevel::Sign);
    assert!(parse(&packet, &strict).unwrap().is_empty());
}

#[test]
fn test_signed_packet_dropped_when_encryption_required() {
    let mut plain = identified_packet();
    gauge_part(&mut plain, 1.0);
    let packet = sign_sha256(&plain, "alice", "secret").unwrap();

    let opts = ParseOptions::new()
        .with_security_level(SecurityLevel::Encrypt)
        .with_password_lookup(lookup());

    assert!(parse(&packet, &opts).unwrap().is_empty());
}

#[test]
fn test_encrypted_packet_decrypted() {
    let buffer = Buffer::new(0);
    buffer.encrypt("alice", "secret");
    buffer.write(&sample()).unwrap();
    let packet = buffer.bytes().unwrap();

    let opts = ParseOptions::new()
        .with_security_level(SecurityLevel::Encrypt)
        .with_password_lookup(lookup());
    let vls = parse(&packet, &opts).unwrap();

    assert_eq!(vls, vec![sample()]);
}

#[test]
fn test_encrypted_packet_skipped_without_lookup() {
    let mut plain = identified_packet();
    gauge_part(&mut plain, 1.0);
    let packet = encrypt_aes256(&plain, "alice", "secret").unwrap();

    let vls = parse(&packet, &ParseOptions::new()).unwrap();

    assert!(vls.is_empty());
}

#[test]
fn test_encrypted_packet_wrong_password() {
    let mut plain = identified_packet();
    gauge_part(&mut plain, 1.0);
    let packet = encrypt_aes256(&plain, "alice", "nope").unwrap();

    let opts = ParseOptions::new().with_password_lookup(lookup());
    let err = parse(&packet, &opts).unwrap_err();

    assert!(matches!(err, ProtocolError::DecryptionFailed(_)));
}

/// Packet of back-to-back empty signature parts
fn stacked_signatures(packet_size: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(packet_size);
    while buf.len() + 4 <= packet_size {
        buf.put_u16(part::SIGN_SHA256);
        buf.put_u16(4);
    }
    buf
}

#[test]
fn test_stacked_signature_parts_use_constant_stack() {
    // A small stack fails fast if each part adds a frame
    let handle = std::thread::Builder::new()
        .stack_size(256 * 1024)
        .spawn(|| {
            for size in [DEFAULT_BUFFER_SIZE, 65_504] {
                let packet = stacked_signatures(size);
                assert_eq!(packet.len() / 4, size / 4);
                assert!(parse(&packet, &ParseOptions::new()).unwrap().is_empty());
            }
        })
        .unwrap();

    handle.join().unwrap();
}

#[test]
fn test_signature_inside_signed_data_rejected() {
    let mut plain = identified_packet();
    gauge_part(&mut plain, 1.0);
    let inner = sign_sha256(&plain, "alice", "secret").unwrap();
    let packet = sign_sha256(&inner, "alice", "secret").unwrap();

    let opts = ParseOptions::new().with_password_lookup(lookup());
    let err = parse(&packet, &opts).unwrap_err();

    assert!(matches!(
        err,
        ProtocolError::InvalidPart {
            part_type: part::SIGN_SHA256,
            ..
        }
    ));
}

#[test]
fn test_encryption_inside_encrypted_data_rejected() {
    let mut plain = identified_packet();
    gauge_part(&mut plain, 1.0);
    let inner = encrypt_aes256(&plain, "alice", "secret").unwrap();
    let packet = encrypt_aes256(&inner, "alice", "secret").unwrap();

    let opts = ParseOptions::new().with_password_lookup(lookup());
    let err = parse(&packet, &opts).unwrap_err();

    assert!(matches!(
        err,
        ProtocolError::InvalidPart {
            part_type: part::ENCRYPT_AES256,
            ..
        }
    ));
}

#[test]
fn test_signed_data_keeps_earlier_parts() {
    // Parts before the signature still feed the running value list
    let mut packet = Vec::new();
    string_part(&mut packet, part::HOST, "h1");
    let mut signed = Vec::new();
    string_part(&mut signed, part::PLUGIN, "cpu");
    string_part(&mut signed, part::TYPE, "percent");
    gauge_part(&mut signed, 2.0);
    packet.extend_from_slice(&sign_sha256(&signed, "alice", "secret").unwrap());

    let opts = ParseOptions::new()
        .with_security_level(SecurityLevel::Sign)
        .with_password_lookup(lookup());
    let vls = parse(&packet, &opts).unwrap();

    assert_eq!(vls.len(), 1);
    assert_eq!(vls[0].identifier.to_string(), "h1/cpu/percent");
}

#[test]
fn test_parse_options_debug_hides_lookup() {
    let opts = ParseOptions::new().with_password_lookup(lookup());
    let debug = format!("{opts:?}");
    assert!(debug.contains("password_lookup: true"));
    assert!(!debug.contains("secret"));
}
