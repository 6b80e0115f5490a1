//! Metrics Estimator
//!
//! Pure domain logic rolling probe outcomes into the persisted
//! historical estimates. Exponentially weighted moving averages with
//! the configured alpha as the weight of the new sample.

use crate::domain::entities::{HistoricalMetrics, UNMEASURED};

/// Estimator for historical endpoint metrics.
///
/// All operations are pure on their inputs; persistence is the
/// caller's concern.
pub struct Estimator;

impl Estimator {
    /// Fold a successful probe into the metrics.
    ///
    /// Each average folds only a valid (non-negative) sample; an
    /// unmeasured dimension leaves its average untouched, so an
    /// uninitialized average never absorbs the sentinel. The first
    /// valid sample becomes the average exactly.
    pub fn record_success(
        metrics: &mut HistoricalMetrics,
        rtt_ms: i64,
        jitter_ms: i64,
        throughput_kbps: i64,
        now_ms: i64,
        alpha: f64,
    ) {
        metrics.avg_rtt_ms = Self::fold(metrics.avg_rtt_ms, rtt_ms, alpha);
        metrics.avg_jitter_ms = Self::fold(metrics.avg_jitter_ms, jitter_ms, alpha);
        metrics.avg_throughput_kbps = Self::fold(metrics.avg_throughput_kbps, throughput_kbps, alpha);
        metrics.success_count += 1;
        // last_update_ms is monotonically non-decreasing
        metrics.last_update_ms = metrics.last_update_ms.max(now_ms);
    }

    /// Fold a failed probe into the metrics. Averages stay unchanged.
    pub fn record_failure(metrics: &mut HistoricalMetrics, now_ms: i64) {
        metrics.failure_count += 1;
        metrics.last_update_ms = metrics.last_update_ms.max(now_ms);
    }

    /// EWMA fold of one sample into one average, truncating toward
    /// zero. Sentinel samples and averages short-circuit.
    fn fold(avg: i64, sample: i64, alpha: f64) -> i64 {
        if sample < 0 {
            return avg;
        }
        if avg == UNMEASURED {
            return sample;
        }
        (alpha * sample as f64 + (1.0 - alpha) * avg as f64) as i64
    }

    /// Jitter statistic over the TCP ping samples of one probe:
    /// the sample standard deviation of the valid samples, in ms.
    /// Fewer than two valid samples yields 0.
    pub fn jitter_from_samples(samples: &[i64]) -> i64 {
        let valid: Vec<f64> = samples
            .iter()
            .filter(|s| **s >= 0)
            .map(|s| *s as f64)
            .collect();
        if valid.len() < 2 {
            return 0;
        }
        let mean = valid.iter().sum::<f64>() / valid.len() as f64;
        let variance = valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (valid.len() - 1) as f64;
        variance.sqrt() as i64
    }

    /// Arithmetic mean of the valid samples, or [`UNMEASURED`] when
    /// every sample failed.
    pub fn mean_of_samples(samples: &[i64]) -> i64 {
        let valid: Vec<i64> = samples.iter().copied().filter(|s| *s >= 0).collect();
        if valid.is_empty() {
            return UNMEASURED;
        }
        valid.iter().sum::<i64>() / valid.len() as i64
    }
}
