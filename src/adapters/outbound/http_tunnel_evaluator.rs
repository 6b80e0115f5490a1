//! HTTP Tunnel Evaluator
//!
//! Measures endpoints through the proxy core's local inbound with
//! reqwest: a no-content URL for the connection test and a sized
//! download for throughput. In TUN mode traffic already traverses
//! the tunnel, so the evaluator can also run without an explicit
//! proxy.

use crate::domain::ports::{ProfileStore, TransientConfig, TunnelEvaluator};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunnel evaluator backed by HTTP requests through the local proxy.
pub struct HttpTunnelEvaluator {
    profiles: Arc<dyn ProfileStore>,
    ping_url: String,
    timeout: Duration,
    local_port: u16,
    use_proxy: bool,
}

impl HttpTunnelEvaluator {
    /// Evaluator routing through a SOCKS5 inbound at `local_port`.
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        local_port: u16,
        ping_url: String,
        timeout: Duration,
    ) -> Self {
        Self {
            profiles,
            ping_url,
            timeout,
            local_port,
            use_proxy: true,
        }
    }

    /// Evaluator for TUN mode: requests go out directly and the
    /// system routing table sends them through the tunnel.
    pub fn direct(profiles: Arc<dyn ProfileStore>, ping_url: String, timeout: Duration) -> Self {
        Self {
            profiles,
            ping_url,
            timeout,
            local_port: 0,
            use_proxy: false,
        }
    }

    fn client(&self, local_port: u16) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if self.use_proxy {
            builder = builder.proxy(reqwest::Proxy::all(format!(
                "socks5://127.0.0.1:{}",
                local_port
            ))?);
        }
        Ok(builder.build()?)
    }
}

#[async_trait]
impl TunnelEvaluator for HttpTunnelEvaluator {
    async fn build_transient_config(&self, id: &str) -> Result<TransientConfig> {
        let profile = self
            .profiles
            .lookup(id)
            .ok_or_else(|| anyhow!("no profile for {}", id))?;
        Ok(TransientConfig {
            content: serde_json::to_string(&profile)?,
            local_port: self.local_port,
        })
    }

    async fn ping_through_tunnel(&self, _content: &str) -> i64 {
        let client = match self.client(self.local_port) {
            Ok(client) => client,
            Err(e) => {
                tracing::debug!("building ping client failed: {:#}", e);
                return -1;
            }
        };

        let start = Instant::now();
        match client.get(&self.ping_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                (start.elapsed().as_millis() as i64).max(1)
            }
            Ok(resp) => {
                tracing::debug!("tunnel ping answered {}", resp.status());
                -1
            }
            Err(e) => {
                tracing::debug!("tunnel ping failed: {:#}", e);
                -1
            }
        }
    }

    async fn fetch_through_tunnel(
        &self,
        url: &str,
        user_agent: &str,
        local_port: u16,
    ) -> Option<u64> {
        let client = self.client(local_port).ok()?;

        let resp = client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            tracing::debug!("tunnel fetch answered {}", resp.status());
            return None;
        }

        resp.bytes().await.ok().map(|body| body.len() as u64)
    }
}
