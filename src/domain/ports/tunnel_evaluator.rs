//! Tunnel Evaluator Port
//!
//! Defines the interface to the proxy core for measurements that must
//! actually traverse the tunnel, as distinct from raw TCP connects.

use anyhow::Result;
use async_trait::async_trait;

/// Transient per-endpoint configuration produced by the proxy core.
#[derive(Debug, Clone)]
pub struct TransientConfig {
    /// Serialized config content handed back to the core for pings
    pub content: String,
    /// Local inbound port the core listens on for this config
    pub local_port: u16,
}

/// Evaluator backed by the proxy core.
///
/// Need not be thread-safe in any deeper sense: the orchestrator
/// probes sequentially within a run.
#[async_trait]
pub trait TunnelEvaluator: Send + Sync {
    /// Build a transient config for an identifier.
    async fn build_transient_config(&self, id: &str) -> Result<TransientConfig>;

    /// Round-trip time of a request routed through the tunnel,
    /// in milliseconds; zero or negative means failure.
    async fn ping_through_tunnel(&self, content: &str) -> i64;

    /// Transfer `url` through the tunnel inbound at `local_port`,
    /// returning the byte count moved, or `None` on failure.
    async fn fetch_through_tunnel(&self, url: &str, user_agent: &str, local_port: u16)
        -> Option<u64>;
}
