//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the auto-selector
//! domain. They have no external dependencies beyond serde derives.

use crate::domain::value_objects::ConnectionKind;
use serde::{Deserialize, Serialize};

/// Sentinel for a measurement or average that has not been taken.
///
/// The `-1` convention is load-bearing: probe primitives, the
/// estimator, the scorer, and the persisted metrics layout all speak
/// it, so it is kept end-to-end instead of an `Option`.
pub const UNMEASURED: i64 = -1;

/// Label written back onto a promoted profile (exact bytes).
pub const AUTO_SELECTOR_LABEL: &str = "Auto Selector";

/// An outbound proxy endpoint as handed out by the profile store.
///
/// The selector treats profile content as read-only except for the
/// label rewrite performed on promotion. `port` stays the raw string
/// the store holds; an endpoint probes only if it parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointProfile {
    /// Human-readable display label
    pub label: String,
    /// Transport/protocol family
    pub kind: ConnectionKind,
    /// Remote host (name or address)
    pub host: String,
    /// Remote port, unparsed
    pub port: String,
}

impl EndpointProfile {
    /// Return the probe address if host and port are both usable.
    ///
    /// An empty host or a port that does not parse as a non-zero u16
    /// disqualifies the endpoint from probing entirely.
    pub fn probe_addr(&self) -> Option<(&str, u16)> {
        if self.host.trim().is_empty() {
            return None;
        }
        match self.port.trim().parse::<u16>() {
            Ok(port) if port > 0 => Some((self.host.trim(), port)),
            _ => None,
        }
    }
}

/// Historical probe estimates for one endpoint, persisted per id.
///
/// The three averages are EWMA-smoothed and carry [`UNMEASURED`]
/// until the first valid sample arrives. `last_update_ms` is epoch
/// milliseconds and never decreases across writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMetrics {
    pub avg_rtt_ms: i64,
    pub avg_jitter_ms: i64,
    pub avg_throughput_kbps: i64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_update_ms: i64,
}

impl Default for HistoricalMetrics {
    fn default() -> Self {
        Self {
            avg_rtt_ms: UNMEASURED,
            avg_jitter_ms: UNMEASURED,
            avg_throughput_kbps: UNMEASURED,
            success_count: 0,
            failure_count: 0,
            last_update_ms: 0,
        }
    }
}

impl HistoricalMetrics {
    /// Whether at least one successful probe has been folded in.
    pub fn has_success(&self) -> bool {
        self.success_count > 0
    }

    /// Share of failed probes, if anything has been observed at all.
    pub fn failure_rate(&self) -> Option<f64> {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            return None;
        }
        Some(self.failure_count as f64 / total as f64)
    }
}

/// Outcome of one probe invocation against one endpoint.
///
/// Lives only for the duration of a selection run; the rolled-forward
/// metrics snapshot it carries is what gets persisted.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Endpoint identifier
    pub id: String,
    /// Profile the probe ran against
    pub profile: EndpointProfile,
    /// Mean TCP connect latency over the valid samples, or [`UNMEASURED`]
    pub rtt_ms: i64,
    /// Sample standard deviation over the valid samples
    pub jitter_ms: i64,
    /// Measured transfer rate, or [`UNMEASURED`]
    pub throughput_kbps: i64,
    /// Whether the tunneled connection test succeeded
    pub connection_successful: bool,
    /// Epoch ms when the probe started
    pub tested_at_ms: i64,
    /// Historical metrics after folding this probe in
    pub metrics: HistoricalMetrics,
}
