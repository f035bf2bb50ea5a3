//! Part encoding
//!
//! `PartWriter` appends TLV parts to a `BytesMut` while tracking a byte
//! budget. Each method computes the exact size of the part first and fails
//! with `NotEnoughSpace` before touching the buffer, so a rejected part
//! never leaves partial bytes behind.
//!
//! # Part Layouts
//!
//! ```text
//! string:  [type u16][len u16 = 4 + n + 1][n bytes][NUL]
//! numeric: [type u16][len u16 = 12][value u64 BE]
//! values:  [0x0006][len u16 = 6 + 9N][N u16][N type bytes][N x 8 byte payloads]
//! ```
//!
//! All integers are big-endian except gauge payloads, which collectd writes
//! as little-endian IEEE-754 doubles.

use bytes::{BufMut, BytesMut};

use crate::{ProtocolError, Result, Value, part};

/// Size of a part header (type + length)
pub(crate) const PART_HEADER_SIZE: usize = 4;

/// Size of a numeric (time / interval) part
pub(crate) const NUMERIC_PART_SIZE: usize = PART_HEADER_SIZE + 8;

/// Header of a values part: part header plus value count
const VALUES_HEADER_SIZE: usize = PART_HEADER_SIZE + 2;

/// Bytes per value: one type byte plus an 8 byte payload
const VALUE_SIZE: usize = 9;

/// Length-checked writer for protocol parts
///
/// # Example
///
/// ```
/// use cdnet_protocol::{BytesMut, PartWriter, part};
///
/// let mut buf = BytesMut::new();
/// let mut writer = PartWriter::new(&mut buf, 64);
/// writer.string(part::HOST, "h1").unwrap();
/// assert_eq!(writer.available(), 64 - 7);
/// assert_eq!(&buf[..], &[0x00, 0x00, 0x00, 0x07, b'h', b'1', 0x00]);
/// ```
#[derive(Debug)]
pub struct PartWriter<'a> {
    buf: &'a mut BytesMut,
    available: usize,
}

impl<'a> PartWriter<'a> {
    /// Create a writer allowed to append at most `available` bytes
    pub fn new(buf: &'a mut BytesMut, available: usize) -> Self {
        Self { buf, available }
    }

    /// Remaining byte budget
    #[inline]
    pub fn available(&self) -> usize {
        self.available
    }

    /// Claim `needed` bytes of the budget
    fn reserve(&mut self, needed: usize) -> Result<()> {
        if needed > self.available {
            return Err(ProtocolError::not_enough_space(needed, self.available));
        }
        self.available -= needed;
        self.buf.reserve(needed);
        Ok(())
    }

    /// Append a NUL terminated string part
    ///
    /// # Errors
    ///
    /// `NotEnoughSpace` if the part does not fit the budget, `InvalidPart`
    /// if the string cannot be framed with a 16-bit length.
    pub fn string(&mut self, part_type: u16, value: &str) -> Result<()> {
        let size = string_part_size(value);
        let len = u16::try_from(size)
            .map_err(|_| ProtocolError::invalid_part(part_type, "string too long"))?;
        self.reserve(size)?;

        self.buf.put_u16(part_type);
        self.buf.put_u16(len);
        self.buf.put_slice(value.as_bytes());
        self.buf.put_u8(0);
        Ok(())
    }

    /// Append a 64-bit numeric part (time, interval)
    pub fn numeric(&mut self, part_type: u16, value: u64) -> Result<()> {
        self.reserve(NUMERIC_PART_SIZE)?;

        self.buf.put_u16(part_type);
        self.buf.put_u16(NUMERIC_PART_SIZE as u16);
        self.buf.put_u64(value);
        Ok(())
    }

    /// Append a values part
    ///
    /// Type bytes for all values come first, then all payloads, both in
    /// list order.
    pub fn values(&mut self, values: &[Value]) -> Result<()> {
        let size = values_part_size(values.len());
        let len = u16::try_from(size)
            .map_err(|_| ProtocolError::invalid_part(part::VALUES, "too many values"))?;
        self.reserve(size)?;

        self.buf.put_u16(part::VALUES);
        self.buf.put_u16(len);
        // len fits u16, so the count does too
        self.buf.put_u16(values.len() as u16);

        for value in values {
            self.buf.put_u8(value.ds_type());
        }

        for value in values {
            match *value {
                Value::Gauge(v) => {
                    let bits = if v.is_nan() { CANONICAL_NAN_BITS } else { v.to_bits() };
                    self.buf.put_u64_le(bits);
                }
                Value::Derive(v) => self.buf.put_i64(v),
                Value::Counter(v) => self.buf.put_u64(v),
            }
        }
        Ok(())
    }
}

/// Bit pattern written for every NaN gauge, whatever its sign or payload
pub const CANONICAL_NAN_BITS: u64 = 0x7ff8_0000_0000_0001;

/// Encoded size of a string part
#[inline]
pub(crate) fn string_part_size(value: &str) -> usize {
    PART_HEADER_SIZE + value.len() + 1
}

/// Encoded size of a values part
#[inline]
pub(crate) fn values_part_size(count: usize) -> usize {
    VALUES_HEADER_SIZE + VALUE_SIZE * count
}
