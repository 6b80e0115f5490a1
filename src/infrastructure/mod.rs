//! Infrastructure Layer
//!
//! Cross-cutting components: the probe primitives, the per-endpoint
//! circuit breaker, and the wall clock.

pub mod circuit_breaker;
pub mod clock;
pub mod probe;

pub use circuit_breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use probe::TcpLatencyProber;
