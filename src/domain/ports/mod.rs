mod affiliation_store;
mod latency_prober;
mod metrics_store;
mod profile_store;
mod selection_sink;
mod tunnel_evaluator;

pub use affiliation_store::AffiliationStore;
pub use latency_prober::{LatencyProber, NullLatencyProber};
pub use metrics_store::MetricsStore;
pub use profile_store::ProfileStore;
pub use selection_sink::SelectionSink;
pub use tunnel_evaluator::{TransientConfig, TunnelEvaluator};
