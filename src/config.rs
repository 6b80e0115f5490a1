use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct SelectorConfig {
    // Probe settings
    pub tcp_timeout_ms: u64,
    pub tcp_ping_samples: u32,
    pub ping_ceiling_ms: i64,
    pub throughput_probe_kb: u64,

    // Circuit breaker settings
    pub failure_threshold: u32,
    pub open_window_ms: i64,
    pub half_open_gap_ms: i64,

    // Estimator settings
    pub ewma_alpha: f64,

    // Tunnel evaluator settings
    pub ping_url: String,
    pub download_url: String,
    pub user_agent: String,
    pub local_proxy_port: u16,

    // Scheduler / persistence settings
    pub db_path: String,
    pub probe_interval_secs: u64,
    pub debug: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            tcp_timeout_ms: 3000,
            tcp_ping_samples: 3,
            ping_ceiling_ms: 5000,
            throughput_probe_kb: 256,
            failure_threshold: 3,
            open_window_ms: 60_000,
            half_open_gap_ms: 10_000,
            ewma_alpha: 0.3,
            ping_url: "http://cp.cloudflare.com/generate_204".to_string(),
            download_url: "https://speed.cloudflare.com/__down?bytes={bytes}".to_string(),
            user_agent: "autoselect/0.1".to_string(),
            local_proxy_port: 10808,
            db_path: "autoselect.db".to_string(),
            probe_interval_secs: 600,
            debug: false,
        }
    }
}

pub fn load_config() -> anyhow::Result<SelectorConfig> {
    let defaults = SelectorConfig::default();

    let tcp_timeout_ms = std::env::var("AUTOSELECT_TCP_TIMEOUT_MS")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(defaults.tcp_timeout_ms);

    let tcp_ping_samples = std::env::var("AUTOSELECT_TCP_PING_SAMPLES")
        .unwrap_or_else(|_| "3".to_string())
        .parse()
        .unwrap_or(defaults.tcp_ping_samples);

    let ping_ceiling_ms = std::env::var("AUTOSELECT_PING_CEILING_MS")
        .unwrap_or_else(|_| "5000".to_string())
        .parse()
        .unwrap_or(defaults.ping_ceiling_ms);

    let throughput_probe_kb = std::env::var("AUTOSELECT_THROUGHPUT_PROBE_KB")
        .unwrap_or_else(|_| "256".to_string())
        .parse()
        .unwrap_or(defaults.throughput_probe_kb);

    let failure_threshold = std::env::var("AUTOSELECT_FAILURE_THRESHOLD")
        .unwrap_or_else(|_| "3".to_string())
        .parse()
        .unwrap_or(defaults.failure_threshold);

    let open_window_ms = std::env::var("AUTOSELECT_OPEN_WINDOW_MS")
        .unwrap_or_else(|_| "60000".to_string())
        .parse()
        .unwrap_or(defaults.open_window_ms);

    let half_open_gap_ms = std::env::var("AUTOSELECT_HALF_OPEN_GAP_MS")
        .unwrap_or_else(|_| "10000".to_string())
        .parse()
        .unwrap_or(defaults.half_open_gap_ms);

    let ewma_alpha = std::env::var("AUTOSELECT_EWMA_ALPHA")
        .unwrap_or_else(|_| "0.3".to_string())
        .parse()
        .unwrap_or(defaults.ewma_alpha);

    let ping_url =
        std::env::var("AUTOSELECT_PING_URL").unwrap_or_else(|_| defaults.ping_url.clone());

    let download_url =
        std::env::var("AUTOSELECT_DOWNLOAD_URL").unwrap_or_else(|_| defaults.download_url.clone());

    let user_agent =
        std::env::var("AUTOSELECT_USER_AGENT").unwrap_or_else(|_| defaults.user_agent.clone());

    let local_proxy_port = std::env::var("AUTOSELECT_PROXY_PORT")
        .unwrap_or_else(|_| "10808".to_string())
        .parse()
        .unwrap_or(defaults.local_proxy_port);

    let db_path =
        std::env::var("AUTOSELECT_DB_PATH").unwrap_or_else(|_| defaults.db_path.clone());

    let probe_interval_secs = std::env::var("AUTOSELECT_PROBE_INTERVAL_SECS")
        .unwrap_or_else(|_| "600".to_string())
        .parse()
        .unwrap_or(defaults.probe_interval_secs);

    let debug = std::env::var("DEBUG").is_ok();

    Ok(SelectorConfig {
        tcp_timeout_ms,
        tcp_ping_samples,
        ping_ceiling_ms,
        throughput_probe_kb,
        failure_threshold,
        open_window_ms,
        half_open_gap_ms,
        ewma_alpha,
        ping_url,
        download_url,
        user_agent,
        local_proxy_port,
        db_path,
        probe_interval_secs,
        debug,
    })
}
