//! Scorer Service
//!
//! Pure domain logic ranking probed endpoints. Lower scores are
//! better. The score combines normalized RTT, jitter, and throughput
//! with penalties for probe failure, historical failure rate, and
//! staleness.

use crate::domain::entities::{ProbeReport, UNMEASURED};
use crate::domain::value_objects::ScoreWeights;

/// Normalization ceiling for RTT: 3 s and above counts as worst.
pub const RTT_CEILING_MS: f64 = 3000.0;
/// Normalization ceiling for jitter: 0.5 s and above counts as worst.
pub const JITTER_CEILING_MS: f64 = 500.0;
/// Normalization ceiling for throughput: 10 Mbps and above counts as best.
pub const THROUGHPUT_CEILING_KBPS: f64 = 10_000.0;
/// Flat penalty for an unsuccessful probe, also the failure-rate scale.
pub const FAILURE_PENALTY: f64 = 10_000.0;
/// Divisor turning metric age into the staleness penalty.
pub const STALENESS_DIVISOR_MS: f64 = 120_000.0;
/// Cap on the staleness penalty.
pub const STALENESS_CAP: f64 = 10_000.0;

/// Scorer for probed endpoints.
pub struct Scorer;

impl Scorer {
    /// Score one probe report. Lower is better.
    ///
    /// Each dimension uses the live measurement when present and
    /// falls back to the historical average otherwise; normalization
    /// clamps sentinels along with outliers. The reserved loss weight
    /// contributes zero until a loss probe exists.
    pub fn score(report: &ProbeReport, weights: &ScoreWeights, now_ms: i64) -> f64 {
        let rtt = Self::effective(report.rtt_ms, report.metrics.avg_rtt_ms);
        let jitter = Self::effective(report.jitter_ms, report.metrics.avg_jitter_ms);
        let throughput =
            Self::effective(report.throughput_kbps, report.metrics.avg_throughput_kbps);

        let n_rtt = (rtt as f64 / RTT_CEILING_MS).clamp(0.0, 1.0);
        let n_jitter = (jitter as f64 / JITTER_CEILING_MS).clamp(0.0, 1.0);
        let n_throughput = 1.0 - (throughput as f64 / THROUGHPUT_CEILING_KBPS).clamp(0.0, 1.0);

        let mut score =
            weights.rtt * n_rtt + weights.jitter * n_jitter + weights.throughput * n_throughput;

        if !report.connection_successful || report.rtt_ms == UNMEASURED {
            score += FAILURE_PENALTY;
        }

        if let Some(rate) = report.metrics.failure_rate() {
            score += rate * FAILURE_PENALTY;
        }

        let age = (now_ms - report.metrics.last_update_ms) as f64 / STALENESS_DIVISOR_MS;
        score += age.clamp(0.0, STALENESS_CAP);

        score
    }

    /// Pick the minimum-score report.
    ///
    /// Ties break by lower effective RTT, then by identifier, so the
    /// ranking is total and deterministic for identical inputs.
    pub fn rank<'a>(
        reports: &'a [ProbeReport],
        weights: &ScoreWeights,
        now_ms: i64,
    ) -> Option<&'a ProbeReport> {
        let mut best: Option<(&ProbeReport, f64)> = None;

        for report in reports {
            let score = Self::score(report, weights, now_ms);
            match &best {
                Some((current, current_score)) => {
                    if Self::beats(report, score, current, *current_score) {
                        best = Some((report, score));
                    }
                }
                None => best = Some((report, score)),
            }
        }

        best.map(|(report, _)| report)
    }

    fn effective(live: i64, historical: i64) -> i64 {
        if live != UNMEASURED {
            live
        } else {
            historical
        }
    }

    fn beats(candidate: &ProbeReport, score: f64, current: &ProbeReport, current_score: f64) -> bool {
        if score != current_score {
            return score < current_score;
        }
        let candidate_rtt = Self::effective(candidate.rtt_ms, candidate.metrics.avg_rtt_ms);
        let current_rtt = Self::effective(current.rtt_ms, current.metrics.avg_rtt_ms);
        if candidate_rtt != current_rtt {
            return candidate_rtt < current_rtt;
        }
        candidate.id < current.id
    }
}
