//! autoselect Library
//!
//! Probing and ranking engine for outbound proxy endpoints. This
//! module exposes the components for use in integration tests and as
//! a library.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::SelectorService;
pub use config::{load_config, SelectorConfig};
pub use domain::entities::{
    EndpointProfile, HistoricalMetrics, ProbeReport, AUTO_SELECTOR_LABEL, UNMEASURED,
};
pub use domain::ports::{
    AffiliationStore, LatencyProber, MetricsStore, ProfileStore, SelectionSink, TransientConfig,
    TunnelEvaluator,
};
pub use domain::services::{Estimator, Scorer};
pub use domain::value_objects::{ConnectionKind, QualityFlag, ScoreWeights};
pub use infrastructure::circuit_breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use infrastructure::probe::TcpLatencyProber;
