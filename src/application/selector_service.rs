//! Selector Service - Main application use case
//!
//! Orchestrates endpoint selection: probing candidates, rolling the
//! historical estimates forward, gating through the circuit breaker,
//! ranking, and promoting the winner. This is the primary interface
//! for schedulers and UIs.

use crate::config::SelectorConfig;
use crate::domain::entities::{
    EndpointProfile, ProbeReport, AUTO_SELECTOR_LABEL, UNMEASURED,
};
use crate::domain::ports::{
    AffiliationStore, LatencyProber, MetricsStore, ProfileStore, SelectionSink, TunnelEvaluator,
};
use crate::domain::services::{Estimator, Scorer};
use crate::domain::value_objects::{QualityFlag, ScoreWeights};
use crate::infrastructure::circuit_breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use crate::infrastructure::{clock, probe};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// RTT below which a usable endpoint is flagged as good quality.
const GOOD_RTT_CEILING_MS: i64 = 800;

/// Selector service - probes, ranks, and promotes proxy endpoints.
///
/// The breaker map lives here for the lifetime of the process; the
/// full-probe pipeline is serialized by a single-flight guard so the
/// map is only ever mutated by one run at a time.
pub struct SelectorService {
    profiles: Arc<dyn ProfileStore>,
    metrics: Arc<dyn MetricsStore>,
    sink: Arc<dyn SelectionSink>,
    tunnel: Arc<dyn TunnelEvaluator>,
    prober: Arc<dyn LatencyProber>,
    affiliations: Option<Arc<dyn AffiliationStore>>,
    breaker: CircuitBreaker,
    weights: ScoreWeights,
    config: SelectorConfig,
    run_guard: Mutex<()>,
}

impl SelectorService {
    /// Create a new selector service.
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        metrics: Arc<dyn MetricsStore>,
        sink: Arc<dyn SelectionSink>,
        tunnel: Arc<dyn TunnelEvaluator>,
        prober: Arc<dyn LatencyProber>,
        config: SelectorConfig,
    ) -> Self {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: config.failure_threshold,
            open_window: Duration::from_millis(config.open_window_ms.max(0) as u64),
            half_open_gap: Duration::from_millis(config.half_open_gap_ms.max(0) as u64),
        });

        Self {
            profiles,
            metrics,
            sink,
            tunnel,
            prober,
            affiliations: None,
            breaker,
            weights: ScoreWeights::default(),
            config,
            run_guard: Mutex::new(()),
        }
    }

    /// Attach an affiliation store for quality flags.
    pub fn with_affiliations(mut self, store: Arc<dyn AffiliationStore>) -> Self {
        self.affiliations = Some(store);
        self
    }

    /// Override the scoring weights.
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Probe every candidate, rank the survivors, promote the winner.
    ///
    /// Side-effecting: persists refreshed metrics for every probed
    /// candidate, mutates the breaker map, rewrites the winner's
    /// label, and publishes the winning id to the selection sink.
    /// Returns the promoted id (as reassigned by the profile store),
    /// or `None` when nothing survives or a store write fails.
    pub async fn auto_select_best_proxy(&self, candidates: &[String]) -> Option<String> {
        let _run = self.run_guard.lock().await;

        if candidates.is_empty() {
            tracing::debug!("auto-select called with no candidates");
            return None;
        }

        // fairness across repeated calls with overlapping populations
        let mut order: Vec<String> = candidates.to_vec();
        let mut rng = StdRng::seed_from_u64(clock::now_ms() as u64);
        order.shuffle(&mut rng);

        let mut reports: Vec<ProbeReport> = Vec::with_capacity(order.len());

        for id in &order {
            let Some(profile) = self.profiles.lookup(id) else {
                tracing::debug!("no profile for {}, skipping", id);
                continue;
            };

            if !self.breaker.admit(id, clock::now_ms()) {
                tracing::debug!("circuit {} for {}, skipping", self.breaker.state(id), id);
                continue;
            }

            let report = self.probe_candidate(id, profile).await;

            if let Err(e) = self.metrics.save_metrics(id, &report.metrics) {
                tracing::error!("persisting metrics for {} failed: {:#}", id, e);
                return None;
            }

            if report.connection_successful {
                self.breaker.record_success(id);
            } else {
                self.breaker.record_failure(id, report.tested_at_ms);
            }

            if let Some(affiliations) = &self.affiliations {
                affiliations.set_quality(id, Self::quality_of(&report));
            }

            tracing::info!(
                "probed {}: rtt={}ms jitter={}ms throughput={}kbps success={}",
                id,
                report.rtt_ms,
                report.jitter_ms,
                report.throughput_kbps,
                report.connection_successful
            );

            reports.push(report);
        }

        let survivors: Vec<ProbeReport> = reports
            .into_iter()
            .filter(|r| {
                self.breaker.state(&r.id) != BreakerState::Open
                    && r.connection_successful
                    && r.rtt_ms != UNMEASURED
            })
            .collect();

        if survivors.is_empty() {
            tracing::warn!("no usable candidate after probing {} endpoints", order.len());
            return None;
        }

        let winner = Scorer::rank(&survivors, &self.weights, clock::now_ms())?;

        let mut promoted = winner.profile.clone();
        promoted.label = AUTO_SELECTOR_LABEL.to_string();
        let stored_id = match self.profiles.write(&winner.id, promoted) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("writing promoted profile for {} failed: {:#}", winner.id, e);
                return None;
            }
        };

        if let Err(e) = self.sink.set_active(&stored_id) {
            tracing::error!("activating {} failed: {:#}", stored_id, e);
            return None;
        }

        tracing::info!(
            "promoted {} (rtt={}ms throughput={}kbps)",
            stored_id,
            winner.rtt_ms,
            winner.throughput_kbps
        );
        Some(stored_id)
    }

    /// Rank candidates on historical estimates alone.
    ///
    /// Pure on its inputs: no probing, no store writes, no breaker
    /// transitions. Candidates without a profile, without a recorded
    /// success, or with an open circuit are excluded.
    pub fn get_best_available_proxy(&self, candidates: &[String]) -> Option<String> {
        let now_ms = clock::now_ms();
        let mut reports: Vec<ProbeReport> = Vec::new();

        for id in candidates {
            let Some(profile) = self.profiles.lookup(id) else {
                continue;
            };
            let Some(metrics) = self.metrics.load_metrics(id) else {
                continue;
            };
            if !metrics.has_success() {
                continue;
            }
            if self.breaker.state(id) == BreakerState::Open {
                continue;
            }

            // treat the history as a just-successful probe
            reports.push(ProbeReport {
                id: id.clone(),
                profile,
                rtt_ms: metrics.avg_rtt_ms,
                jitter_ms: metrics.avg_jitter_ms,
                throughput_kbps: metrics.avg_throughput_kbps,
                connection_successful: true,
                tested_at_ms: metrics.last_update_ms,
                metrics,
            });
        }

        Scorer::rank(&reports, &self.weights, now_ms).map(|r| r.id.clone())
    }

    /// Breaker state for an identifier; read-only.
    pub fn breaker_state(&self, id: &str) -> BreakerState {
        self.breaker.state(id)
    }

    /// Run the full probe battery against one endpoint.
    async fn probe_candidate(&self, id: &str, profile: EndpointProfile) -> ProbeReport {
        let mut metrics = self.metrics.load_metrics(id).unwrap_or_default();
        let tested_at_ms = clock::now_ms();

        let (rtt_ms, jitter_ms, connection_successful, throughput_kbps) =
            match profile.probe_addr() {
                None => {
                    tracing::warn!("endpoint {} has unusable host/port", id);
                    (UNMEASURED, 0, false, UNMEASURED)
                }
                Some((host, port)) => {
                    let mut samples = Vec::with_capacity(self.config.tcp_ping_samples as usize);
                    for _ in 0..self.config.tcp_ping_samples {
                        samples.push(self.prober.measure(host, port).await);
                    }
                    let rtt_ms = Estimator::mean_of_samples(&samples);
                    let jitter_ms = Estimator::jitter_from_samples(&samples);

                    let tunneled = probe::tunneled_rtt(
                        self.tunnel.as_ref(),
                        id,
                        self.config.ping_ceiling_ms,
                    )
                    .await;
                    let connection_successful = tunneled != UNMEASURED;

                    let throughput_kbps = if connection_successful {
                        probe::throughput_kbps(
                            self.tunnel.as_ref(),
                            id,
                            self.config.throughput_probe_kb,
                            &self.config.download_url,
                            &self.config.user_agent,
                        )
                        .await
                    } else {
                        UNMEASURED
                    };

                    (rtt_ms, jitter_ms, connection_successful, throughput_kbps)
                }
            };

        let now_ms = clock::now_ms();
        if connection_successful {
            Estimator::record_success(
                &mut metrics,
                rtt_ms,
                jitter_ms,
                throughput_kbps,
                now_ms,
                self.config.ewma_alpha,
            );
        } else {
            Estimator::record_failure(&mut metrics, now_ms);
        }

        ProbeReport {
            id: id.to_string(),
            profile,
            rtt_ms,
            jitter_ms,
            throughput_kbps,
            connection_successful,
            tested_at_ms,
            metrics,
        }
    }

    fn quality_of(report: &ProbeReport) -> QualityFlag {
        if !report.connection_successful {
            QualityFlag::Unusable
        } else if report.rtt_ms != UNMEASURED && report.rtt_ms < GOOD_RTT_CEILING_MS {
            QualityFlag::Good
        } else {
            QualityFlag::Degraded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::{
        MemoryAffiliationStore, MemoryMetricsStore, MemoryProfileStore, MemorySelectionSink,
    };
    use crate::domain::entities::HistoricalMetrics;
    use crate::domain::ports::{NullLatencyProber, TransientConfig};
    use crate::domain::value_objects::ConnectionKind;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;

    // ===== Mock Implementations =====

    /// Evaluator scripted per identifier: missing ids fail config
    /// building, non-positive pings fail the connection test.
    struct ScriptedEvaluator {
        pings: HashMap<String, i64>,
    }

    impl ScriptedEvaluator {
        fn new(pings: &[(&str, i64)]) -> Self {
            Self {
                pings: pings
                    .iter()
                    .map(|(id, ms)| (id.to_string(), *ms))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl TunnelEvaluator for ScriptedEvaluator {
        async fn build_transient_config(&self, id: &str) -> Result<TransientConfig> {
            if self.pings.contains_key(id) {
                Ok(TransientConfig {
                    content: id.to_string(),
                    local_port: 1080,
                })
            } else {
                Err(anyhow!("no config for {}", id))
            }
        }

        async fn ping_through_tunnel(&self, content: &str) -> i64 {
            self.pings.get(content).copied().unwrap_or(-1)
        }

        async fn fetch_through_tunnel(
            &self,
            _url: &str,
            _user_agent: &str,
            _local_port: u16,
        ) -> Option<u64> {
            Some(256 * 1024)
        }
    }

    /// Prober scripted per host.
    struct ScriptedProber {
        latencies: HashMap<String, i64>,
    }

    impl ScriptedProber {
        fn new(latencies: &[(&str, i64)]) -> Self {
            Self {
                latencies: latencies
                    .iter()
                    .map(|(host, ms)| (host.to_string(), *ms))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl LatencyProber for ScriptedProber {
        async fn measure(&self, host: &str, _port: u16) -> i64 {
            self.latencies.get(host).copied().unwrap_or(UNMEASURED)
        }
    }

    struct FailingMetricsStore;

    impl MetricsStore for FailingMetricsStore {
        fn load_metrics(&self, _id: &str) -> Option<HistoricalMetrics> {
            None
        }
        fn save_metrics(&self, _id: &str, _metrics: &HistoricalMetrics) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    // ===== Test Helpers =====

    fn profile(host: &str) -> EndpointProfile {
        EndpointProfile {
            label: "node".to_string(),
            kind: ConnectionKind::Vmess,
            host: host.to_string(),
            port: "443".to_string(),
        }
    }

    struct Fixture {
        profiles: Arc<MemoryProfileStore>,
        metrics: Arc<MemoryMetricsStore>,
        sink: Arc<MemorySelectionSink>,
    }

    fn service(
        fixture: &Fixture,
        evaluator: ScriptedEvaluator,
        prober: Arc<dyn LatencyProber>,
    ) -> SelectorService {
        SelectorService::new(
            fixture.profiles.clone(),
            fixture.metrics.clone(),
            fixture.sink.clone(),
            Arc::new(evaluator),
            prober,
            SelectorConfig::default(),
        )
    }

    fn fixture() -> Fixture {
        Fixture {
            profiles: Arc::new(MemoryProfileStore::new()),
            metrics: Arc::new(MemoryMetricsStore::new()),
            sink: Arc::new(MemorySelectionSink::new()),
        }
    }

    // ===== Full-Probe Pipeline Tests =====

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let f = fixture();
        let svc = service(&f, ScriptedEvaluator::new(&[]), Arc::new(NullLatencyProber));

        assert!(svc.auto_select_best_proxy(&[]).await.is_none());
        assert!(f.sink.active().is_none());
    }

    #[tokio::test]
    async fn test_missing_profile_skipped_without_metrics_write() {
        let f = fixture();
        let svc = service(&f, ScriptedEvaluator::new(&[]), Arc::new(NullLatencyProber));

        let result = svc.auto_select_best_proxy(&["ghost".to_string()]).await;
        assert!(result.is_none());
        assert!(f.metrics.load_metrics("ghost").is_none());
        assert_eq!(svc.breaker_state("ghost"), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_winner_promoted_with_label_and_sink() {
        let f = fixture();
        f.profiles.insert("a", profile("a.example.com"));
        f.profiles.insert("b", profile("b.example.com"));

        let svc = service(
            &f,
            ScriptedEvaluator::new(&[("a", 200), ("b", 200)]),
            Arc::new(ScriptedProber::new(&[
                ("a.example.com", 100),
                ("b.example.com", 50),
            ])),
        );

        let winner = svc
            .auto_select_best_proxy(&["a".to_string(), "b".to_string()])
            .await;
        assert_eq!(winner.as_deref(), Some("b"));
        assert_eq!(f.sink.active().as_deref(), Some("b"));
        assert_eq!(
            f.profiles.lookup("b").unwrap().label,
            AUTO_SELECTOR_LABEL
        );
        // loser keeps its label
        assert_eq!(f.profiles.lookup("a").unwrap().label, "node");
    }

    #[tokio::test]
    async fn test_metrics_persisted_for_every_probed_candidate() {
        let f = fixture();
        f.profiles.insert("a", profile("a.example.com"));
        f.profiles.insert("b", profile("b.example.com"));

        let svc = service(
            &f,
            ScriptedEvaluator::new(&[("a", 200)]), // b has no config: failure
            Arc::new(ScriptedProber::new(&[
                ("a.example.com", 100),
                ("b.example.com", 50),
            ])),
        );

        svc.auto_select_best_proxy(&["a".to_string(), "b".to_string()])
            .await;

        let a = f.metrics.load_metrics("a").unwrap();
        assert_eq!(a.success_count, 1);
        assert_eq!(a.avg_rtt_ms, 100);

        let b = f.metrics.load_metrics("b").unwrap();
        assert_eq!(b.failure_count, 1);
        assert_eq!(b.avg_rtt_ms, UNMEASURED);
    }

    #[tokio::test]
    async fn test_tcp_only_success_is_not_promotable() {
        // tunneled ping succeeds but every TCP sample fails: the
        // candidate records a success yet cannot win with rtt unmeasured
        let f = fixture();
        f.profiles.insert("a", profile("a.example.com"));

        let svc = service(
            &f,
            ScriptedEvaluator::new(&[("a", 200)]),
            Arc::new(NullLatencyProber),
        );

        let result = svc.auto_select_best_proxy(&["a".to_string()]).await;
        assert!(result.is_none());

        let m = f.metrics.load_metrics("a").unwrap();
        assert_eq!(m.success_count, 1);
        assert_eq!(m.avg_rtt_ms, UNMEASURED);
    }

    #[tokio::test]
    async fn test_malformed_endpoint_counts_as_failure() {
        let f = fixture();
        f.profiles.insert(
            "bad",
            EndpointProfile {
                label: "node".to_string(),
                kind: ConnectionKind::Trojan,
                host: "h.example.com".to_string(),
                port: "not-a-port".to_string(),
            },
        );

        let svc = service(
            &f,
            ScriptedEvaluator::new(&[("bad", 200)]),
            Arc::new(NullLatencyProber),
        );

        assert!(svc.auto_select_best_proxy(&["bad".to_string()]).await.is_none());
        assert_eq!(f.metrics.load_metrics("bad").unwrap().failure_count, 1);
    }

    #[tokio::test]
    async fn test_breaker_opens_after_three_failing_runs_then_skips() {
        let f = fixture();
        f.profiles.insert("a", profile("a.example.com"));

        // evaluator that knows the id but always fails the ping
        let svc = service(
            &f,
            ScriptedEvaluator::new(&[("a", -1)]),
            Arc::new(NullLatencyProber),
        );
        let candidates = vec!["a".to_string()];

        for expected_failures in 1..=3u64 {
            assert!(svc.auto_select_best_proxy(&candidates).await.is_none());
            assert_eq!(
                f.metrics.load_metrics("a").unwrap().failure_count,
                expected_failures
            );
        }
        assert_eq!(svc.breaker_state("a"), BreakerState::Open);

        // within the open window the candidate is skipped entirely
        assert!(svc.auto_select_best_proxy(&candidates).await.is_none());
        assert_eq!(f.metrics.load_metrics("a").unwrap().failure_count, 3);
    }

    #[tokio::test]
    async fn test_store_write_failure_fails_the_run() {
        let f = fixture();
        f.profiles.insert("a", profile("a.example.com"));

        let svc = SelectorService::new(
            f.profiles.clone(),
            Arc::new(FailingMetricsStore),
            f.sink.clone(),
            Arc::new(ScriptedEvaluator::new(&[("a", 200)])),
            Arc::new(ScriptedProber::new(&[("a.example.com", 50)])),
            SelectorConfig::default(),
        );

        assert!(svc.auto_select_best_proxy(&["a".to_string()]).await.is_none());
        assert!(f.sink.active().is_none());
    }

    #[tokio::test]
    async fn test_quality_flags_recorded() {
        let f = fixture();
        f.profiles.insert("a", profile("a.example.com"));
        f.profiles.insert("b", profile("b.example.com"));
        let affiliations = Arc::new(MemoryAffiliationStore::new());

        let svc = service(
            &f,
            ScriptedEvaluator::new(&[("a", 200)]),
            Arc::new(ScriptedProber::new(&[("a.example.com", 50)])),
        )
        .with_affiliations(affiliations.clone());

        svc.auto_select_best_proxy(&["a".to_string(), "b".to_string()])
            .await;

        assert_eq!(affiliations.quality("a"), Some(QualityFlag::Good));
        assert_eq!(affiliations.quality("b"), Some(QualityFlag::Unusable));
    }

    // ===== Cached Pipeline Tests =====

    fn history(rtt: i64, jitter: i64, throughput: i64, successes: u64) -> HistoricalMetrics {
        HistoricalMetrics {
            avg_rtt_ms: rtt,
            avg_jitter_ms: jitter,
            avg_throughput_kbps: throughput,
            success_count: successes,
            failure_count: 0,
            last_update_ms: clock::now_ms(),
        }
    }

    #[tokio::test]
    async fn test_cached_ranking_prefers_better_history() {
        let f = fixture();
        f.profiles.insert("a", profile("a.example.com"));
        f.profiles.insert("b", profile("b.example.com"));
        f.metrics
            .save_metrics("a", &history(100, 10, 5000, 5))
            .unwrap();
        f.metrics
            .save_metrics("b", &history(50, 5, 10_000, 10))
            .unwrap();

        let svc = service(&f, ScriptedEvaluator::new(&[]), Arc::new(NullLatencyProber));

        let best = svc.get_best_available_proxy(&["a".to_string(), "b".to_string()]);
        assert_eq!(best.as_deref(), Some("b"));
        // side-effect free
        assert!(f.sink.active().is_none());
        assert_eq!(f.profiles.lookup("b").unwrap().label, "node");
    }

    #[tokio::test]
    async fn test_cached_ranking_requires_history_and_profile() {
        let f = fixture();
        f.profiles.insert("no-history", profile("a.example.com"));
        f.metrics
            .save_metrics("no-profile", &history(50, 5, 10_000, 3))
            .unwrap();
        // observed but never successful
        f.profiles.insert("failures-only", profile("c.example.com"));
        f.metrics
            .save_metrics(
                "failures-only",
                &HistoricalMetrics {
                    failure_count: 7,
                    ..Default::default()
                },
            )
            .unwrap();

        let svc = service(&f, ScriptedEvaluator::new(&[]), Arc::new(NullLatencyProber));

        let candidates = vec![
            "no-history".to_string(),
            "no-profile".to_string(),
            "failures-only".to_string(),
        ];
        assert!(svc.get_best_available_proxy(&candidates).is_none());
    }

    #[tokio::test]
    async fn test_cached_ranking_excludes_open_breaker() {
        let f = fixture();
        f.profiles.insert("a", profile("a.example.com"));
        f.metrics
            .save_metrics("a", &history(50, 5, 10_000, 3))
            .unwrap();

        let svc = service(
            &f,
            ScriptedEvaluator::new(&[("a", -1)]),
            Arc::new(NullLatencyProber),
        );

        // three failing runs open the circuit
        for _ in 0..3 {
            svc.auto_select_best_proxy(&["a".to_string()]).await;
        }
        assert_eq!(svc.breaker_state("a"), BreakerState::Open);

        assert!(svc.get_best_available_proxy(&["a".to_string()]).is_none());
    }

    #[tokio::test]
    async fn test_cached_ranking_is_repeatable() {
        let f = fixture();
        f.profiles.insert("a", profile("a.example.com"));
        f.profiles.insert("b", profile("b.example.com"));
        f.metrics
            .save_metrics("a", &history(100, 10, 5000, 5))
            .unwrap();
        f.metrics
            .save_metrics("b", &history(50, 5, 10_000, 10))
            .unwrap();

        let svc = service(&f, ScriptedEvaluator::new(&[]), Arc::new(NullLatencyProber));

        let candidates = vec!["a".to_string(), "b".to_string()];
        let first = svc.get_best_available_proxy(&candidates);
        for _ in 0..5 {
            assert_eq!(svc.get_best_available_proxy(&candidates), first);
        }
    }
}
