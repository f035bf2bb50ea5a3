//! cdnet Client Library
//!
//! Sends value lists to a collectd server over UDP. A [`Client`] owns one
//! [`Buffer`](cdnet_protocol::Buffer): writes are encoded into it and a
//! datagram goes out whenever the buffer fills up or [`Client::flush`] is
//! called.
//!
//! # Example
//!
//! ```ignore
//! use cdnet_client::{Client, ClientOptions};
//! use cdnet_protocol::{Identifier, Value, ValueList};
//!
//! let client = Client::connect("127.0.0.1:25826", ClientOptions::default()).await?;
//!
//! let vl = ValueList::new(Identifier::new("web-01", "cpu", "percent"))
//!     .with_values(vec![Value::Gauge(42.5)]);
//! client.write(&vl).await?;
//!
//! client.close().await?;
//! ```

mod client;
mod error;

pub use client::{Client, ClientMetrics, ClientMetricsSnapshot, ClientOptions};
pub use error::{ClientError, Result};
