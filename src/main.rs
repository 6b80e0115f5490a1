//! autoselect - Proxy Auto-Selector
//!
//! This is the composition root that wires together all the components.

use autoselect::adapters::inbound::ProbeScheduler;
use autoselect::adapters::outbound::{HttpTunnelEvaluator, SqliteStore};
use autoselect::domain::ports::{
    AffiliationStore, MetricsStore, ProfileStore, SelectionSink, TunnelEvaluator,
};
use autoselect::infrastructure::TcpLatencyProber;
use autoselect::{load_config, SelectorService};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting autoselect db={} proxy_port={} interval={}s",
        cfg.db_path,
        cfg.local_proxy_port,
        cfg.probe_interval_secs
    );

    // ===== COMPOSITION ROOT =====

    // Persistent store backs every outbound port
    let store = Arc::new(SqliteStore::open(&cfg.db_path)?);
    let profiles: Arc<dyn ProfileStore> = store.clone();
    let metrics: Arc<dyn MetricsStore> = store.clone();
    let sink: Arc<dyn SelectionSink> = store.clone();
    let affiliations: Arc<dyn AffiliationStore> = store.clone();

    // Tunnel evaluator through the proxy core's local inbound
    let tunnel: Arc<dyn TunnelEvaluator> = Arc::new(HttpTunnelEvaluator::new(
        profiles.clone(),
        cfg.local_proxy_port,
        cfg.ping_url.clone(),
        Duration::from_millis(cfg.ping_ceiling_ms.max(0) as u64),
    ));

    // Raw connect-latency prober
    let prober = Arc::new(TcpLatencyProber::new(Duration::from_millis(
        cfg.tcp_timeout_ms,
    )));

    // Application service
    let service = Arc::new(
        SelectorService::new(
            profiles.clone(),
            metrics,
            sink,
            tunnel,
            prober,
            cfg.clone(),
        )
        .with_affiliations(affiliations),
    );

    // Inbound adapter: the probe scheduler drives the service
    let scheduler = ProbeScheduler::new(
        service,
        profiles,
        Duration::from_secs(cfg.probe_interval_secs),
    );

    scheduler.start().await?;
    Ok(())
}
