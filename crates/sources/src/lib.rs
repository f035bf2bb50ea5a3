//! cdnet Sources
//!
//! Network sources that receive collectd packets, decode them and hand the
//! value lists to a [`Writer`](cdnet_protocol::Writer).
//!
//! # Available Sources
//!
//! - **UDP** - collectd binary protocol over UDP, unicast or multicast
//!
//! # Example
//!
//! ```ignore
//! use cdnet_sources::{CollectdUdpSource, CollectdUdpSourceConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = CollectdUdpSourceConfig {
//!     address: "0.0.0.0".into(),
//!     port: 25826,
//!     ..Default::default()
//! };
//!
//! let source = CollectdUdpSource::new(config, writer);
//! source.run(CancellationToken::new()).await?;
//! ```

pub mod udp;

pub use udp::{
    CollectdUdpMetricsSnapshot, CollectdUdpSource, CollectdUdpSourceConfig,
    CollectdUdpSourceError, CollectdUdpSourceMetrics,
};
