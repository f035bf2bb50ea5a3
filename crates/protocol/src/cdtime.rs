//! collectd high-resolution time
//!
//! collectd's `cdtime_t` is a 64-bit fixed-point number: the upper 34 bits
//! hold whole seconds, the lower 30 bits a binary fraction of a second
//! (2^30 units per second, roughly 0.93ns). Both timestamps (since the Unix
//! epoch) and intervals use this layout on the wire.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

const NANOS_PER_SEC: u64 = 1_000_000_000;
const FRACTION_BITS: u32 = 30;
const FRACTION_MASK: u64 = (1 << FRACTION_BITS) - 1;
const MAX_SECONDS: u64 = u64::MAX >> FRACTION_BITS;

/// A time or duration in collectd's 2^30 fixed-point representation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CdTime(u64);

impl CdTime {
    /// The zero time / empty interval
    pub const ZERO: Self = Self(0);

    /// Wrap a raw wire value
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw wire value
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Largest representable value, about 2^34 seconds (year 2514 as a timestamp)
    pub const MAX: Self = Self(u64::MAX);

    /// Whole seconds with no fraction (legacy TIME / INTERVAL parts)
    ///
    /// Saturates at [`CdTime::MAX`].
    #[inline]
    pub const fn from_seconds(secs: u64) -> Self {
        if secs > MAX_SECONDS {
            return Self::MAX;
        }
        Self(secs << FRACTION_BITS)
    }

    /// Convert seconds plus nanoseconds, rounding the fraction to nearest
    ///
    /// Saturates at [`CdTime::MAX`] once `secs` needs more than 34 bits.
    pub const fn from_parts(secs: u64, nanos: u32) -> Self {
        if secs > MAX_SECONDS {
            return Self::MAX;
        }
        let nanos = (nanos as u64) % NANOS_PER_SEC;
        let fraction = ((nanos << FRACTION_BITS) + NANOS_PER_SEC / 2) / NANOS_PER_SEC;
        Self((secs << FRACTION_BITS) | fraction)
    }

    /// Convert a nanosecond count
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self::from_parts(nanos / NANOS_PER_SEC, (nanos % NANOS_PER_SEC) as u32)
    }

    /// Convert a wall-clock instant; instants before the epoch map to zero
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        let secs = time.timestamp();
        if secs < 0 {
            return Self::ZERO;
        }
        Self::from_parts(secs as u64, time.timestamp_subsec_nanos())
    }

    /// Convert an interval
    #[inline]
    pub const fn from_duration(duration: Duration) -> Self {
        Self::from_parts(duration.as_secs(), duration.subsec_nanos())
    }

    /// Split into whole seconds and nanoseconds, rounding to nearest
    const fn decompose(self) -> (u64, u32) {
        let secs = self.0 >> FRACTION_BITS;
        let fraction = self.0 & FRACTION_MASK;
        let nanos = (fraction * NANOS_PER_SEC + (1 << (FRACTION_BITS - 1))) >> FRACTION_BITS;
        (secs, nanos as u32)
    }

    /// Convert back to a wall-clock instant
    pub fn to_datetime(self) -> DateTime<Utc> {
        let (secs, nanos) = self.decompose();
        i64::try_from(secs)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, nanos))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Convert back to an interval
    pub const fn to_duration(self) -> Duration {
        let (secs, nanos) = self.decompose();
        Duration::new(secs, nanos)
    }
}

impl From<Duration> for CdTime {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

impl From<DateTime<Utc>> for CdTime {
    fn from(time: DateTime<Utc>) -> Self {
        Self::from_datetime(time)
    }
}

impl fmt::Display for CdTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (secs, nanos) = self.decompose();
        write!(f, "{secs}.{nanos:09}")
    }
}
