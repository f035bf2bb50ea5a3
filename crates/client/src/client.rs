//! UDP client
//!
//! Encodes value lists into a [`Buffer`] and sends the buffer as one
//! datagram when it is full or when flushed explicitly. Signing and
//! encryption are configured once at connect time.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use cdnet_protocol::{Buffer, SecurityLevel, ValueList, Writer};
use tokio::net::UdpSocket;

use crate::error::{ClientError, Result};

// =============================================================================
// Options
// =============================================================================

/// Client configuration
#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Maximum datagram size (0 selects the protocol default)
    pub buffer_size: usize,

    /// Security applied to every datagram
    pub security_level: SecurityLevel,

    /// Username for signing/encryption
    pub username: String,

    /// Password for signing/encryption
    pub password: String,
}

impl ClientOptions {
    /// Set the maximum datagram size
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sign datagrams with HMAC-SHA256
    #[must_use]
    pub fn with_signing(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.with_security(SecurityLevel::Sign, username, password)
    }

    /// Encrypt datagrams with AES-256
    #[must_use]
    pub fn with_encryption(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.with_security(SecurityLevel::Encrypt, username, password)
    }

    /// Set security level and credentials together
    #[must_use]
    pub fn with_security(
        mut self,
        level: SecurityLevel,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.security_level = level;
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Build the buffer described by these options
    fn buffer(&self) -> Result<Buffer> {
        if self.security_level != SecurityLevel::None
            && (self.username.is_empty() || self.password.is_empty())
        {
            return Err(ClientError::MissingCredentials(self.security_level));
        }

        let buffer = Buffer::new(self.buffer_size);
        match self.security_level {
            SecurityLevel::None => {}
            SecurityLevel::Sign => buffer.sign(&self.username, &self.password),
            SecurityLevel::Encrypt => buffer.encrypt(&self.username, &self.password),
        }
        Ok(buffer)
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("buffer_size", &self.buffer_size)
            .field("security_level", &self.security_level)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Client metrics
#[derive(Debug, Default)]
pub struct ClientMetrics {
    /// Datagrams handed to the socket
    pub datagrams_sent: AtomicU64,

    /// Bytes handed to the socket
    pub bytes_sent: AtomicU64,

    /// Failed sends
    pub send_errors: AtomicU64,

    /// Value lists accepted into the buffer
    pub value_lists_written: AtomicU64,
}

impl ClientMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            datagrams_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            value_lists_written: AtomicU64::new(0),
        }
    }

    #[inline]
    fn datagram_sent(&self, bytes: u64) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    fn send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn value_list_written(&self) {
        self.value_lists_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> ClientMetricsSnapshot {
        ClientMetricsSnapshot {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            value_lists_written: self.value_lists_written.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of client metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientMetricsSnapshot {
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub value_lists_written: u64,
}

// =============================================================================
// Client
// =============================================================================

/// UDP client for one collectd server
///
/// All methods take `&self`, so a client can be shared between tasks
/// behind an `Arc`. The buffer lock is never held while sending.
pub struct Client {
    socket: UdpSocket,
    server: SocketAddr,
    buffer: Buffer,
    metrics: Arc<ClientMetrics>,
}

impl Client {
    /// Resolve `addr`, bind an ephemeral local socket and connect it
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` if signing or encryption is requested
    /// without a username and password, `InvalidAddress` if `addr` does not
    /// resolve, or an I/O error from the socket.
    pub async fn connect(addr: &str, options: ClientOptions) -> Result<Self> {
        let buffer = options.buffer()?;

        let server = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| ClientError::InvalidAddress(format!("{addr}: {e}")))?
            .next()
            .ok_or_else(|| ClientError::InvalidAddress(addr.to_string()))?;

        let local: SocketAddr = if server.is_ipv4() {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(server).await?;

        tracing::debug!(
            server = %server,
            local = %socket.local_addr()?,
            buffer_size = buffer.capacity(),
            security_level = %buffer.security_level(),
            "collectd client connected"
        );

        Ok(Self {
            socket,
            server,
            buffer,
            metrics: Arc::new(ClientMetrics::new()),
        })
    }

    /// Add a value list to the pending datagram
    ///
    /// If the buffer is full, it is flushed and the write retried once.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails, or if the value list does not
    /// fit even into an empty buffer.
    pub async fn write(&self, vl: &ValueList) -> Result<()> {
        match self.buffer.write(vl) {
            Ok(()) => {}
            Err(e) if e.is_not_enough_space() => {
                self.flush().await?;
                self.buffer.write(vl)?;
            }
            Err(e) => return Err(e.into()),
        }
        self.metrics.value_list_written();
        Ok(())
    }

    /// Send the pending datagram, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope cannot be built or the send fails.
    /// On a send failure the drained data is lost.
    pub async fn flush(&self) -> Result<()> {
        let packet = self.buffer.bytes()?;
        if packet.is_empty() {
            return Ok(());
        }

        match self.socket.send(&packet).await {
            Ok(n) => {
                self.metrics.datagram_sent(n as u64);
                tracing::debug!(server = %self.server, bytes = n, "datagram sent");
                Ok(())
            }
            Err(e) => {
                self.metrics.send_error();
                tracing::debug!(server = %self.server, error = %e, "datagram send failed");
                Err(e.into())
            }
        }
    }

    /// Flush and release the socket
    ///
    /// # Errors
    ///
    /// Returns the error of the final flush.
    pub async fn close(self) -> Result<()> {
        self.flush().await
    }

    /// Server this client sends to
    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// Local socket address
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Encoded bytes waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &Arc<ClientMetrics> {
        &self.metrics
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let pending = self.buffer.len();
        if pending > 0 {
            tracing::debug!(
                server = %self.server,
                pending,
                "collectd client dropped with unflushed data"
            );
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.server)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Writer for Client {
    type Error = ClientError;

    async fn write(&self, vl: &ValueList) -> Result<()> {
        Client::write(self, vl).await
    }
}
