//! Latency Prober Port
//!
//! Raw connect-latency measurement, abstracted so selection pipelines
//! can be exercised without real sockets.

use crate::domain::entities::UNMEASURED;
use async_trait::async_trait;

/// Measures raw TCP connect latency to an endpoint.
#[async_trait]
pub trait LatencyProber: Send + Sync {
    /// Elapsed connect time in milliseconds, or [`UNMEASURED`] on any
    /// socket or resolution error. Must not retry.
    async fn measure(&self, host: &str, port: u16) -> i64;
}

/// Prober that fails every measurement. Useful as a stand-in when
/// only tunneled measurements matter.
pub struct NullLatencyProber;

#[async_trait]
impl LatencyProber for NullLatencyProber {
    async fn measure(&self, _host: &str, _port: u16) -> i64 {
        UNMEASURED
    }
}
