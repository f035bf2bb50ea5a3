//! collectd UDP Source
//!
//! Receives collectd binary protocol datagrams, decodes them and forwards
//! every value list to a [`Writer`].
//!
//! # Design
//!
//! - One socket, one receive task; decoding is cheap compared to the
//!   writer, so there is nothing to gain from more workers
//! - Multicast group addresses are joined automatically
//! - Malformed packets and writer failures are counted and logged, never
//!   fatal: one bad sender must not stop the server
//!
//! # Example
//!
//! ```ignore
//! let config = CollectdUdpSourceConfig {
//!     address: "239.192.74.66".into(),
//!     ..Default::default()
//! };
//!
//! let source = CollectdUdpSource::new(config, Arc::new(writer));
//! source.run(cancel).await?;
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cdnet_protocol::{DEFAULT_BUFFER_SIZE, DEFAULT_PORT, ParseOptions, Writer, parse};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Constants
// =============================================================================

/// Default socket receive buffer (64KB)
const DEFAULT_RECV_BUFFER_SIZE: usize = 64 * 1024;

// =============================================================================
// Configuration
// =============================================================================

/// collectd UDP source configuration
#[derive(Debug, Clone)]
pub struct CollectdUdpSourceConfig {
    /// Source identifier used in logs
    pub id: String,

    /// Bind address (unicast or multicast group)
    pub address: String,

    /// Listen port
    pub port: u16,

    /// Largest datagram accepted; larger ones are dropped
    pub max_packet_size: usize,

    /// Kernel receive buffer (SO_RCVBUF)
    pub recv_buffer_size: usize,

    /// Security requirements and credentials for decoding
    pub parse_options: ParseOptions,
}

impl Default for CollectdUdpSourceConfig {
    fn default() -> Self {
        Self {
            id: "collectd_udp".into(),
            address: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            max_packet_size: DEFAULT_BUFFER_SIZE,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            parse_options: ParseOptions::default(),
        }
    }
}

impl CollectdUdpSourceConfig {
    /// Create config with custom port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address to bind to
    pub fn bind_address(&self) -> String {
        match self.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{}]:{}", self.address, self.port),
            _ => format!("{}:{}", self.address, self.port),
        }
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// collectd UDP source metrics
#[derive(Debug, Default)]
pub struct CollectdUdpSourceMetrics {
    /// Datagrams received
    pub packets_received: AtomicU64,

    /// Bytes received
    pub bytes_received: AtomicU64,

    /// Value lists decoded and handed to the writer
    pub value_lists_decoded: AtomicU64,

    /// Datagrams that failed to decode (including oversized ones)
    pub decode_errors: AtomicU64,

    /// Value lists the writer rejected
    pub writer_errors: AtomicU64,
}

impl CollectdUdpSourceMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            packets_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            value_lists_decoded: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            writer_errors: AtomicU64::new(0),
        }
    }

    /// Record a packet received
    #[inline]
    pub fn packet_received(&self, bytes: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record value lists decoded from one packet
    #[inline]
    pub fn value_lists_decoded(&self, count: u64) {
        self.value_lists_decoded.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a packet that could not be decoded
    #[inline]
    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a writer failure
    #[inline]
    pub fn writer_error(&self) {
        self.writer_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get metrics snapshot
    pub fn snapshot(&self) -> CollectdUdpMetricsSnapshot {
        CollectdUdpMetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            value_lists_decoded: self.value_lists_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            writer_errors: self.writer_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot for the collectd UDP source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectdUdpMetricsSnapshot {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub value_lists_decoded: u64,
    pub decode_errors: u64,
    pub writer_errors: u64,
}

// =============================================================================
// Errors
// =============================================================================

/// collectd UDP source errors
#[derive(Debug, thiserror::Error)]
pub enum CollectdUdpSourceError {
    /// Failed to bind to address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to join a multicast group
    #[error("failed to join multicast group {group}: {source}")]
    Multicast {
        group: IpAddr,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Source Implementation
// =============================================================================

/// collectd UDP source
///
/// Generic over the writer so the receive loop calls it without dynamic
/// dispatch.
pub struct CollectdUdpSource<W> {
    config: CollectdUdpSourceConfig,
    writer: Arc<W>,
    metrics: Arc<CollectdUdpSourceMetrics>,
}

impl<W: Writer> CollectdUdpSource<W> {
    /// Create a new collectd UDP source
    pub fn new(config: CollectdUdpSourceConfig, writer: Arc<W>) -> Self {
        Self {
            config,
            writer,
            metrics: Arc::new(CollectdUdpSourceMetrics::new()),
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &Arc<CollectdUdpSourceMetrics> {
        &self.metrics
    }

    /// Get the source configuration
    pub fn config(&self) -> &CollectdUdpSourceConfig {
        &self.config
    }

    /// Bind and serve until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), CollectdUdpSourceError> {
        let socket = self.bind()?;
        self.serve(socket, cancel).await
    }

    /// Create the listening socket
    ///
    /// Sets SO_REUSEADDR, enlarges the receive buffer and joins the group
    /// if the bind address is a multicast address.
    pub fn bind(&self) -> Result<UdpSocket, CollectdUdpSourceError> {
        let bind_addr = self.config.bind_address();
        let addr: SocketAddr = bind_addr
            .parse()
            .map_err(|_| CollectdUdpSourceError::Bind {
                address: bind_addr.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "invalid socket address",
                ),
            })?;

        let socket = self
            .create_socket(addr)
            .map_err(|source| CollectdUdpSourceError::Bind {
                address: bind_addr,
                source,
            })?;

        if addr.ip().is_multicast() {
            join_multicast(&socket, addr.ip()).map_err(|source| {
                CollectdUdpSourceError::Multicast {
                    group: addr.ip(),
                    source,
                }
            })?;
        }

        socket.set_nonblocking(true)?;
        let std_socket: std::net::UdpSocket = socket.into();
        Ok(UdpSocket::from_std(std_socket)?)
    }

    fn create_socket(&self, addr: SocketAddr) -> std::io::Result<Socket> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;

        if let Err(e) = socket.set_recv_buffer_size(self.config.recv_buffer_size) {
            tracing::warn!(
                error = %e,
                requested_size = self.config.recv_buffer_size,
                "failed to set UDP SO_RCVBUF"
            );
        }

        socket.bind(&addr.into())?;
        Ok(socket)
    }

    /// Receive on an already bound socket until `cancel` fires
    pub async fn serve(
        &self,
        socket: UdpSocket,
        cancel: CancellationToken,
    ) -> Result<(), CollectdUdpSourceError> {
        tracing::info!(
            source_id = %self.config.id,
            address = %socket.local_addr()?,
            security_level = %self.config.parse_options.security_level,
            max_packet_size = self.config.max_packet_size,
            "collectd UDP source listening"
        );

        // One spare byte tells an exactly-full datagram from a truncated one
        let mut recv_buf = vec![0u8; self.config.max_packet_size + 1];

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                recv_result = socket.recv_from(&mut recv_buf) => {
                    match recv_result {
                        Ok((len, peer)) => self.process_packet(&recv_buf[..len], peer).await,
                        Err(e) => {
                            tracing::debug!(
                                source_id = %self.config.id,
                                error = %e,
                                "collectd UDP recv error"
                            );
                        }
                    }
                }
            }
        }

        tracing::info!(
            source_id = %self.config.id,
            "collectd UDP source stopped"
        );

        Ok(())
    }

    /// Decode one datagram and forward its value lists
    async fn process_packet(&self, data: &[u8], peer: SocketAddr) {
        self.metrics.packet_received(data.len() as u64);

        if data.len() > self.config.max_packet_size {
            self.metrics.decode_error();
            tracing::warn!(
                source_id = %self.config.id,
                peer = %peer,
                max = self.config.max_packet_size,
                "collectd packet too large, dropping"
            );
            return;
        }

        let vls = match parse(data, &self.config.parse_options) {
            Ok(vls) => vls,
            Err(e) => {
                self.metrics.decode_error();
                tracing::warn!(
                    source_id = %self.config.id,
                    peer = %peer,
                    size = data.len(),
                    error = %e,
                    "failed to decode collectd packet"
                );
                return;
            }
        };

        self.metrics.value_lists_decoded(vls.len() as u64);
        tracing::trace!(peer = %peer, value_lists = vls.len(), "collectd packet decoded");

        for vl in &vls {
            if let Err(e) = self.writer.write(vl).await {
                self.metrics.writer_error();
                tracing::warn!(
                    source_id = %self.config.id,
                    identifier = %vl.identifier,
                    error = %e,
                    "writer rejected value list"
                );
            }
        }
    }
}

/// Join `group` on the default interface
fn join_multicast(socket: &Socket, group: IpAddr) -> std::io::Result<()> {
    match group {
        IpAddr::V4(group) => socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(group) => socket.join_multicast_v6(&group, 0),
    }
}

#[cfg(test)]
#[path = "udp_test.rs"]
mod udp_test;
