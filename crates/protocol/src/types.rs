//! Sample data model
//!
//! These types mirror collectd's `value_list_t`: an identifier naming the
//! metric stream, a timestamp, the collection interval and one or more
//! typed values.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ds_type;

/// Identifies the origin and category of a sample stream
///
/// Rendered as `host/plugin[-plugin_instance]/type[-type_instance]`.
///
/// # Example
///
/// ```
/// use cdnet_protocol::Identifier;
///
/// let id = Identifier::new("web-01", "cpu", "percent")
///     .with_plugin_instance("0")
///     .with_type_instance("idle");
/// assert_eq!(id.to_string(), "web-01/cpu-0/percent-idle");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub host: String,
    pub plugin: String,
    pub plugin_instance: String,
    pub type_: String,
    pub type_instance: String,
}

impl Identifier {
    /// Create an identifier without instances
    pub fn new(host: impl Into<String>, plugin: impl Into<String>, type_: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            plugin: plugin.into(),
            type_: type_.into(),
            ..Default::default()
        }
    }

    /// Set the plugin instance
    #[must_use]
    pub fn with_plugin_instance(mut self, plugin_instance: impl Into<String>) -> Self {
        self.plugin_instance = plugin_instance.into();
        self
    }

    /// Set the type instance
    #[must_use]
    pub fn with_type_instance(mut self, type_instance: impl Into<String>) -> Self {
        self.type_instance = type_instance.into();
        self
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.plugin)?;
        if !self.plugin_instance.is_empty() {
            write!(f, "-{}", self.plugin_instance)?;
        }
        write!(f, "/{}", self.type_)?;
        if !self.type_instance.is_empty() {
            write!(f, "-{}", self.type_instance)?;
        }
        Ok(())
    }
}

/// A single typed measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Point-in-time value; NaN marks an unknown reading
    Gauge(f64),
    /// Signed rate-of-change counter
    Derive(i64),
    /// Unsigned monotonic counter
    Counter(u64),
}

impl Value {
    /// Data source type code used on the wire
    #[inline]
    pub const fn ds_type(&self) -> u8 {
        match self {
            Self::Counter(_) => ds_type::COUNTER,
            Self::Gauge(_) => ds_type::GAUGE,
            Self::Derive(_) => ds_type::DERIVE,
        }
    }

    /// Get the string name of this value kind
    #[inline]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Gauge(_) => "gauge",
            Self::Derive(_) => "derive",
            Self::Counter(_) => "counter",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gauge(v) => write!(f, "{v}"),
            Self::Derive(v) => write!(f, "{v}"),
            Self::Counter(v) => write!(f, "{v}"),
        }
    }
}

/// One observation of a metric stream
#[derive(Debug, Clone, PartialEq)]
pub struct ValueList {
    pub identifier: Identifier,
    pub time: DateTime<Utc>,
    pub interval: Duration,
    pub values: Vec<Value>,
}

impl ValueList {
    /// Create a value list stamped with the current time and no values
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            time: Utc::now(),
            interval: Duration::ZERO,
            values: Vec::new(),
        }
    }

    /// Set the timestamp
    #[must_use]
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    /// Set the collection interval
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Replace the values
    #[must_use]
    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }
}

impl fmt::Display for ValueList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.identifier, self.time.to_rfc3339())?;
        for value in &self.values {
            write!(f, " {}={}", value.kind(), value)?;
        }
        Ok(())
    }
}

/// Security applied to a packet
///
/// Levels are ordered: a receiver requiring `Sign` accepts signed and
/// encrypted data but drops plain text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityLevel {
    /// Plain text (default)
    #[default]
    None,
    /// HMAC-SHA256 signed
    Sign,
    /// AES-256 encrypted
    Encrypt,
}

impl SecurityLevel {
    /// Get the string name of this level
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sign => "sign",
            Self::Encrypt => "encrypt",
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
