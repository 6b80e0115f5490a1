//! Probe Primitives
//!
//! Raw measurements against one endpoint: TCP connect latency,
//! tunneled round-trip time, and a timed throughput transfer. Each
//! primitive returns a positive measurement or [`UNMEASURED`], never
//! an error, and never retries.

use crate::domain::entities::UNMEASURED;
use crate::domain::ports::{LatencyProber, TunnelEvaluator};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// TCP connect-latency prober.
///
/// Opens a raw connection, measures wall-clock elapsed around the
/// connect, and closes the socket on every exit path.
pub struct TcpLatencyProber {
    timeout: Duration,
}

impl TcpLatencyProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl LatencyProber for TcpLatencyProber {
    async fn measure(&self, host: &str, port: u16) -> i64 {
        let addr = format!("{}:{}", host, port);
        let start = Instant::now();

        match tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(mut stream)) => {
                let elapsed = start.elapsed().as_millis() as i64;
                let _ = stream.shutdown().await;
                elapsed
            }
            Ok(Err(_)) | Err(_) => UNMEASURED,
        }
    }
}

/// Round-trip time of a request routed through the tunnel.
///
/// Acquires a transient config; only a ping strictly inside
/// `(0, ceiling_ms)` counts as a measurement.
pub async fn tunneled_rtt(evaluator: &dyn TunnelEvaluator, id: &str, ceiling_ms: i64) -> i64 {
    let config = match evaluator.build_transient_config(id).await {
        Ok(config) => config,
        Err(e) => {
            tracing::debug!("transient config for {} failed: {:#}", id, e);
            return UNMEASURED;
        }
    };

    let rtt = evaluator.ping_through_tunnel(&config.content).await;
    if rtt > 0 && rtt < ceiling_ms {
        rtt
    } else {
        UNMEASURED
    }
}

/// Throughput of a `size_kb` KB transfer through the tunnel, in kbps.
///
/// `download_url` carries a `{bytes}` placeholder for the transfer
/// size. The rate derives from measured wall-clock, not from any
/// synthetic estimate.
pub async fn throughput_kbps(
    evaluator: &dyn TunnelEvaluator,
    id: &str,
    size_kb: u64,
    download_url: &str,
    user_agent: &str,
) -> i64 {
    let config = match evaluator.build_transient_config(id).await {
        Ok(config) => config,
        Err(e) => {
            tracing::debug!("transient config for {} failed: {:#}", id, e);
            return UNMEASURED;
        }
    };

    let url = download_url.replace("{bytes}", &(size_kb * 1024).to_string());
    let start = Instant::now();

    match evaluator
        .fetch_through_tunnel(&url, user_agent, config.local_port)
        .await
    {
        Some(bytes) if bytes > 0 => {
            // sub-millisecond transfers round up to 1 ms
            let elapsed_ms = (start.elapsed().as_millis() as u64).max(1);
            ((size_kb * 8 * 1000) / elapsed_ms) as i64
        }
        _ => UNMEASURED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::TransientConfig;
    use anyhow::{anyhow, Result};
    use tokio::net::TcpListener;

    struct ScriptedEvaluator {
        config_ok: bool,
        ping_ms: i64,
        fetch_bytes: Option<u64>,
        fetch_delay: Duration,
    }

    #[async_trait]
    impl TunnelEvaluator for ScriptedEvaluator {
        async fn build_transient_config(&self, id: &str) -> Result<TransientConfig> {
            if self.config_ok {
                Ok(TransientConfig {
                    content: format!("config-{}", id),
                    local_port: 1080,
                })
            } else {
                Err(anyhow!("core rejected {}", id))
            }
        }

        async fn ping_through_tunnel(&self, _content: &str) -> i64 {
            self.ping_ms
        }

        async fn fetch_through_tunnel(
            &self,
            _url: &str,
            _user_agent: &str,
            _local_port: u16,
        ) -> Option<u64> {
            tokio::time::sleep(self.fetch_delay).await;
            self.fetch_bytes
        }
    }

    fn evaluator(ping_ms: i64) -> ScriptedEvaluator {
        ScriptedEvaluator {
            config_ok: true,
            ping_ms,
            fetch_bytes: Some(256 * 1024),
            fetch_delay: Duration::from_millis(0),
        }
    }

    // ===== TCP Latency Tests =====

    #[tokio::test]
    async fn test_tcp_measure_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let prober = TcpLatencyProber::new(Duration::from_secs(1));
        let latency = prober.measure("127.0.0.1", port).await;
        assert!(latency >= 0);
    }

    #[tokio::test]
    async fn test_tcp_measure_refused() {
        let prober = TcpLatencyProber::new(Duration::from_millis(200));
        assert_eq!(prober.measure("127.0.0.1", 1).await, UNMEASURED);
    }

    #[tokio::test]
    async fn test_tcp_measure_timeout() {
        // non-routable address trips the timeout, not a refusal
        let prober = TcpLatencyProber::new(Duration::from_millis(100));
        assert_eq!(prober.measure("10.255.255.1", 80).await, UNMEASURED);
    }

    #[tokio::test]
    async fn test_tcp_measure_unresolvable_host() {
        let prober = TcpLatencyProber::new(Duration::from_millis(500));
        assert_eq!(prober.measure("no-such-host.invalid", 80).await, UNMEASURED);
    }

    // ===== Tunneled RTT Tests =====

    #[tokio::test]
    async fn test_tunneled_rtt_in_range() {
        let eval = evaluator(200);
        assert_eq!(tunneled_rtt(&eval, "a", 5000).await, 200);
    }

    #[tokio::test]
    async fn test_tunneled_rtt_rejects_out_of_range() {
        for ping in [0, -1, -100, 5000, 9999] {
            let eval = evaluator(ping);
            assert_eq!(tunneled_rtt(&eval, "a", 5000).await, UNMEASURED);
        }
    }

    #[tokio::test]
    async fn test_tunneled_rtt_config_failure() {
        let eval = ScriptedEvaluator {
            config_ok: false,
            ..evaluator(200)
        };
        assert_eq!(tunneled_rtt(&eval, "a", 5000).await, UNMEASURED);
    }

    // ===== Throughput Tests =====

    #[tokio::test]
    async fn test_throughput_derives_from_elapsed() {
        let eval = ScriptedEvaluator {
            fetch_delay: Duration::from_millis(500),
            ..evaluator(200)
        };
        let kbps = throughput_kbps(&eval, "a", 256, "http://x/{bytes}", "ua").await;

        // 256 KB over ~500 ms is ~4096 kbps; allow scheduler slack
        assert!(kbps > 3000, "kbps = {}", kbps);
        assert!(kbps <= 4096, "kbps = {}", kbps);
    }

    #[tokio::test]
    async fn test_throughput_failure_paths() {
        let eval = ScriptedEvaluator {
            fetch_bytes: None,
            ..evaluator(200)
        };
        assert_eq!(
            throughput_kbps(&eval, "a", 256, "http://x/{bytes}", "ua").await,
            UNMEASURED
        );

        let eval = ScriptedEvaluator {
            config_ok: false,
            ..evaluator(200)
        };
        assert_eq!(
            throughput_kbps(&eval, "a", 256, "http://x/{bytes}", "ua").await,
            UNMEASURED
        );
    }

    #[tokio::test]
    async fn test_throughput_substitutes_size_placeholder() {
        struct UrlCapture {
            inner: ScriptedEvaluator,
            seen: tokio::sync::Mutex<Option<String>>,
        }

        #[async_trait]
        impl TunnelEvaluator for UrlCapture {
            async fn build_transient_config(&self, id: &str) -> Result<TransientConfig> {
                self.inner.build_transient_config(id).await
            }
            async fn ping_through_tunnel(&self, content: &str) -> i64 {
                self.inner.ping_through_tunnel(content).await
            }
            async fn fetch_through_tunnel(
                &self,
                url: &str,
                user_agent: &str,
                local_port: u16,
            ) -> Option<u64> {
                *self.seen.lock().await = Some(url.to_string());
                self.inner
                    .fetch_through_tunnel(url, user_agent, local_port)
                    .await
            }
        }

        let capture = UrlCapture {
            inner: evaluator(200),
            seen: tokio::sync::Mutex::new(None),
        };
        throughput_kbps(&capture, "a", 256, "http://x/?bytes={bytes}", "ua").await;

        let seen = capture.seen.lock().await.clone().unwrap();
        assert_eq!(seen, format!("http://x/?bytes={}", 256 * 1024));
    }
}
