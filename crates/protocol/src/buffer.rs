//! Packet buffer
//!
//! `Buffer` accumulates value lists into one size-bounded packet. It keeps
//! the identifier, time and interval of the last value list it encoded and
//! only re-emits the fields that changed, which is where the protocol gets
//! most of its compactness from: consecutive samples from one plugin
//! usually share everything but the type instance and the values.
//!
//! # Capacity
//!
//! `size` bounds the packet handed to the transport, including the security
//! envelope added when draining. The envelope cost is reserved up front:
//!
//! | level   | overhead             |
//! |---------|----------------------|
//! | none    | 0                    |
//! | sign    | 36 + len(username)   |
//! | encrypt | 42 + len(username)   |
//!
//! # Atomicity
//!
//! `write` either appends the complete encoding of a value list or leaves
//! the buffer and its diff state untouched. A failed drain never discards
//! pending data.

use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use crate::crypto::{ENCRYPT_OVERHEAD, SIGN_OVERHEAD, encrypt_aes256, sign_sha256};
use crate::{
    CdTime, DEFAULT_BUFFER_SIZE, Identifier, PartWriter, ProtocolError, Result, SecurityLevel,
    ValueList, part,
};

/// Thread-safe, size-bounded packet encoder
///
/// All methods take `&self`; one internal mutex serialises writes and
/// drains, so a `Buffer` can be shared between producers behind an `Arc`.
///
/// # Example
///
/// ```
/// use cdnet_protocol::{Buffer, Identifier, Value, ValueList};
///
/// let buffer = Buffer::new(1024);
/// buffer.sign("alice", "secret");
///
/// let vl = ValueList::new(Identifier::new("h1", "cpu", "percent"))
///     .with_values(vec![Value::Gauge(42.5)]);
/// buffer.write(&vl).unwrap();
///
/// let packet = buffer.bytes().unwrap();
/// assert_eq!(&packet[..2], &[0x02, 0x00]);
/// assert!(buffer.is_empty());
/// ```
pub struct Buffer {
    size: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    buf: BytesMut,
    state: DiffState,
    security: Security,
}

/// Fields of the last encoded value list
#[derive(Debug, Clone, Default, PartialEq)]
struct DiffState {
    identifier: Identifier,
    time: CdTime,
    interval: CdTime,
}

#[derive(Clone, Default)]
enum Security {
    #[default]
    None,
    Sign { username: String, password: String },
    Encrypt { username: String, password: String },
}

impl Security {
    fn level(&self) -> SecurityLevel {
        match self {
            Self::None => SecurityLevel::None,
            Self::Sign { .. } => SecurityLevel::Sign,
            Self::Encrypt { .. } => SecurityLevel::Encrypt,
        }
    }

    fn overhead(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Sign { username, .. } => SIGN_OVERHEAD + username.len(),
            Self::Encrypt { username, .. } => ENCRYPT_OVERHEAD + username.len(),
        }
    }
}

impl fmt::Debug for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Sign { username, .. } => {
                f.debug_struct("Sign").field("username", username).finish_non_exhaustive()
            }
            Self::Encrypt { username, .. } => {
                f.debug_struct("Encrypt").field("username", username).finish_non_exhaustive()
            }
        }
    }
}

impl Buffer {
    /// Create a buffer producing packets of at most `size` bytes
    ///
    /// A `size` of zero selects [`DEFAULT_BUFFER_SIZE`].
    pub fn new(size: usize) -> Self {
        let size = if size == 0 { DEFAULT_BUFFER_SIZE } else { size };
        Self {
            size,
            inner: Mutex::new(Inner {
                buf: BytesMut::with_capacity(size),
                state: DiffState::default(),
                security: Security::None,
            }),
        }
    }

    /// Sign drained packets with HMAC-SHA256
    ///
    /// Replaces any previously configured security.
    pub fn sign(&self, username: impl Into<String>, password: impl Into<String>) {
        self.inner.lock().security = Security::Sign {
            username: username.into(),
            password: password.into(),
        };
    }

    /// Encrypt drained packets with AES-256
    ///
    /// Replaces any previously configured security.
    pub fn encrypt(&self, username: impl Into<String>, password: impl Into<String>) {
        self.inner.lock().security = Security::Encrypt {
            username: username.into(),
            password: password.into(),
        };
    }

    /// Configured security level
    pub fn security_level(&self) -> SecurityLevel {
        self.inner.lock().security.level()
    }

    /// Maximum packet size
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Bytes still available for value lists
    ///
    /// Never negative: clamps at zero when the envelope alone would exceed
    /// the capacity.
    pub fn available(&self) -> usize {
        self.inner.lock().available(self.size)
    }

    /// Number of pending encoded bytes (without envelope)
    pub fn len(&self) -> usize {
        self.inner.lock().buf.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.inner.lock().buf.is_empty()
    }

    /// Append a value list
    ///
    /// # Errors
    ///
    /// Returns `NotEnoughSpace` if the encoding does not fit; the buffer is
    /// left exactly as it was, so the caller can drain and retry.
    pub fn write(&self, vl: &ValueList) -> Result<()> {
        let mut inner = self.inner.lock();
        let len = inner.buf.len();

        let result = inner.encode(self.size, vl);
        if result.is_err() {
            inner.buf.truncate(len);
        }
        result
    }

    /// Drain the pending packet into `out`
    ///
    /// Applies the configured envelope. On success the buffer is empty and
    /// the next write re-emits all identifier, time and interval fields.
    ///
    /// # Errors
    ///
    /// Returns `NotEnoughSpace` if `out` cannot hold the packet, or a crypto
    /// error from the envelope. Pending data is kept on error.
    pub fn read(&self, out: &mut [u8]) -> Result<usize> {
        self.inner.lock().drain_into(out)
    }

    /// Drain the pending packet into a freshly allocated buffer
    pub fn bytes(&self) -> Result<Bytes> {
        let mut out = vec![0u8; self.size];
        let n = self.read(&mut out)?;
        out.truncate(n);
        Ok(Bytes::from(out))
    }

    /// Drain the pending packet and write it to `w`
    ///
    /// Returns the number of bytes written. The lock is held for the whole
    /// call, so concurrent callers write packets in drain order.
    pub fn write_to<W: io::Write + ?Sized>(&self, w: &mut W) -> Result<usize> {
        let mut inner = self.inner.lock();
        let mut out = vec![0u8; self.size];
        let n = inner.drain_into(&mut out)?;
        w.write_all(&out[..n])?;
        Ok(n)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Buffer")
            .field("size", &self.size)
            .field("len", &inner.buf.len())
            .field("security", &inner.security)
            .finish()
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl Inner {
    fn available(&self, size: usize) -> usize {
        size.saturating_sub(self.security.overhead() + self.buf.len())
    }

    /// Encode `vl`, committing the diff state only if every part fit
    fn encode(&mut self, size: usize, vl: &ValueList) -> Result<()> {
        let available = self.available(size);
        let Self { buf, state, .. } = self;
        let mut writer = PartWriter::new(buf, available);

        let id = &vl.identifier;
        let old = &state.identifier;
        let fields = [
            (part::HOST, &id.host, &old.host),
            (part::PLUGIN, &id.plugin, &old.plugin),
            (part::PLUGIN_INSTANCE, &id.plugin_instance, &old.plugin_instance),
            (part::TYPE, &id.type_, &old.type_),
            (part::TYPE_INSTANCE, &id.type_instance, &old.type_instance),
        ];
        for (part_type, new, old) in fields {
            if new != old {
                writer.string(part_type, new)?;
            }
        }

        let time = CdTime::from_datetime(vl.time);
        if time != state.time {
            writer.numeric(part::TIME_HR, time.as_raw())?;
        }

        let interval = CdTime::from_duration(vl.interval);
        if interval != state.interval {
            writer.numeric(part::INTERVAL_HR, interval.as_raw())?;
        }

        writer.values(&vl.values)?;

        state.identifier.clone_from(id);
        state.time = time;
        state.interval = interval;
        Ok(())
    }

    fn drain_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let needed = self.security.overhead() + self.buf.len();
        if out.len() < needed {
            return Err(ProtocolError::not_enough_space(needed, out.len()));
        }

        let n = match &self.security {
            Security::None => {
                out[..self.buf.len()].copy_from_slice(&self.buf);
                self.buf.len()
            }
            Security::Sign { username, password } => {
                let packet = sign_sha256(&self.buf, username, password)?;
                out[..packet.len()].copy_from_slice(&packet);
                packet.len()
            }
            Security::Encrypt { username, password } => {
                let packet = encrypt_aes256(&self.buf, username, password)?;
                out[..packet.len()].copy_from_slice(&packet);
                packet.len()
            }
        };

        tracing::trace!(bytes = n, security = %self.security.level(), "buffer drained");
        self.reset();
        Ok(n)
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.state = DiffState::default();
    }
}
