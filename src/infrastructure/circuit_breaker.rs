//! Circuit Breaker Pattern
//!
//! Suppresses probes to endpoints that keep failing, so a dead
//! endpoint does not cost connect timeouts on every selection run.

use dashmap::DashMap;
use std::time::Duration;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// How long an open circuit skips the endpoint entirely
    pub open_window: Duration,
    /// Minimum age of the failure stamp before a half-open probe
    pub half_open_gap: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_window: Duration::from_secs(60),
            half_open_gap: Duration::from_secs(10),
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakerState {
    /// Normal operation - probes admitted
    #[default]
    Closed,
    /// Circuit tripped - endpoint skipped
    Open,
    /// Testing recovery - one probe admitted after the gap
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Per-endpoint circuit state.
#[derive(Debug, Clone, Default)]
struct EndpointCircuit {
    state: BreakerState,
    consecutive_failures: u32,
    /// Epoch ms of the failure that opened the circuit
    last_failure_ms: i64,
}

/// Circuit breaker over endpoint identifiers.
///
/// Process-lifetime only; historical metrics already carry long-term
/// reliability, so the map is cheap to rebuild after a restart. The
/// orchestrator owns all mutation during a selection run.
pub struct CircuitBreaker {
    config: BreakerConfig,
    circuits: DashMap<String, EndpointCircuit>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            circuits: DashMap::new(),
        }
    }

    /// Decide whether a probe of this endpoint is admitted at `now_ms`.
    ///
    /// Performs the OPEN to HALF_OPEN transition once the open window
    /// has elapsed; in HALF_OPEN a probe is admitted only after the
    /// half-open gap since the failure stamp.
    pub fn admit(&self, id: &str, now_ms: i64) -> bool {
        let mut circuit = self.circuits.entry(id.to_string()).or_default();

        match circuit.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let open_ms = self.config.open_window.as_millis() as i64;
                if now_ms.saturating_sub(circuit.last_failure_ms) < open_ms {
                    return false;
                }
                // window elapsed: half-open, stamp unchanged
                circuit.state = BreakerState::HalfOpen;
                tracing::info!("circuit for {} half-open", id);
                Self::half_open_ready(&circuit, &self.config, now_ms)
            }
            BreakerState::HalfOpen => Self::half_open_ready(&circuit, &self.config, now_ms),
        }
    }

    fn half_open_ready(circuit: &EndpointCircuit, config: &BreakerConfig, now_ms: i64) -> bool {
        let gap_ms = config.half_open_gap.as_millis() as i64;
        now_ms.saturating_sub(circuit.last_failure_ms) >= gap_ms
    }

    /// Record a successful probe result: back to CLOSED, counters reset.
    pub fn record_success(&self, id: &str) {
        let mut circuit = self.circuits.entry(id.to_string()).or_default();
        if circuit.state != BreakerState::Closed {
            tracing::info!("circuit for {} closed (recovered)", id);
        }
        circuit.state = BreakerState::Closed;
        circuit.consecutive_failures = 0;
    }

    /// Record a failed probe result at `now_ms`.
    pub fn record_failure(&self, id: &str, now_ms: i64) {
        let mut circuit = self.circuits.entry(id.to_string()).or_default();

        match circuit.state {
            BreakerState::Closed => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    circuit.state = BreakerState::Open;
                    circuit.last_failure_ms = now_ms;
                    tracing::warn!(
                        "circuit for {} opened after {} failures",
                        id,
                        circuit.consecutive_failures
                    );
                }
            }
            BreakerState::HalfOpen => {
                // a failed trial probe re-opens with a fresh stamp
                circuit.state = BreakerState::Open;
                circuit.last_failure_ms = now_ms;
                tracing::warn!("circuit for {} re-opened (failed half-open probe)", id);
            }
            BreakerState::Open => {}
        }
    }

    /// Current state for an identifier, without any transition.
    pub fn state(&self, id: &str) -> BreakerState {
        self.circuits
            .get(id)
            .map(|c| c.state)
            .unwrap_or_default()
    }

    /// Consecutive failure count for an identifier.
    pub fn consecutive_failures(&self, id: &str) -> u32 {
        self.circuits
            .get(id)
            .map(|c| c.consecutive_failures)
            .unwrap_or(0)
    }

    /// Failure stamp for an identifier, epoch ms; 0 if never failed over.
    pub fn last_failure_ms(&self, id: &str) -> i64 {
        self.circuits
            .get(id)
            .map(|c| c.last_failure_ms)
            .unwrap_or(0)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
