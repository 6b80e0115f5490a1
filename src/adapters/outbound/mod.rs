mod http_tunnel_evaluator;
mod memory_stores;
mod sqlite_store;

pub use http_tunnel_evaluator::HttpTunnelEvaluator;
pub use memory_stores::{
    MemoryAffiliationStore, MemoryMetricsStore, MemoryProfileStore, MemorySelectionSink,
};
pub use sqlite_store::SqliteStore;
