//! Metrics Store Port
//!
//! Defines the interface for persisting historical probe estimates.

use crate::domain::entities::HistoricalMetrics;
use anyhow::Result;

/// Store for historical metrics per endpoint identifier.
///
/// A record must be persisted fully or not at all: `save_metrics` is
/// the single store operation for one identifier's update, and a
/// failed save surfaces to the orchestrator as a failed run.
pub trait MetricsStore: Send + Sync {
    /// Load the persisted metrics for an identifier, if any.
    fn load_metrics(&self, id: &str) -> Option<HistoricalMetrics>;

    /// Persist the metrics for an identifier in one operation.
    fn save_metrics(&self, id: &str, metrics: &HistoricalMetrics) -> Result<()>;
}
