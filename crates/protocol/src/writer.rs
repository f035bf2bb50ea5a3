//! Value list sink

use async_trait::async_trait;

use crate::ValueList;

/// Consumer of value lists
///
/// Implemented by the UDP client (encode and send) and by anything the
/// receiving server should hand decoded samples to.
#[async_trait]
pub trait Writer: Send + Sync {
    /// Error returned when a value list cannot be accepted
    type Error: std::error::Error + Send + Sync + 'static;

    /// Accept one value list
    async fn write(&self, vl: &ValueList) -> Result<(), Self::Error>;
}
