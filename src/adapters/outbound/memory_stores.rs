//! In-Memory Stores
//!
//! DashMap-backed implementations of the store ports. Used by tests
//! and by embedders that manage profiles themselves.

use crate::domain::entities::{EndpointProfile, HistoricalMetrics};
use crate::domain::ports::{AffiliationStore, MetricsStore, ProfileStore, SelectionSink};
use crate::domain::value_objects::QualityFlag;
use anyhow::Result;
use dashmap::DashMap;
use parking_lot::Mutex;

/// In-memory profile store.
pub struct MemoryProfileStore {
    profiles: DashMap<String, EndpointProfile>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }

    /// Seed a profile under an identifier.
    pub fn insert(&self, id: &str, profile: EndpointProfile) {
        self.profiles.insert(id.to_string(), profile);
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn lookup(&self, id: &str) -> Option<EndpointProfile> {
        self.profiles.get(id).map(|p| p.clone())
    }

    fn write(&self, id: &str, profile: EndpointProfile) -> Result<String> {
        self.profiles.insert(id.to_string(), profile);
        Ok(id.to_string())
    }

    fn candidate_ids(&self) -> Vec<String> {
        self.profiles.iter().map(|e| e.key().clone()).collect()
    }
}

/// In-memory metrics store.
pub struct MemoryMetricsStore {
    records: DashMap<String, HistoricalMetrics>,
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl Default for MemoryMetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsStore for MemoryMetricsStore {
    fn load_metrics(&self, id: &str) -> Option<HistoricalMetrics> {
        self.records.get(id).map(|m| m.clone())
    }

    fn save_metrics(&self, id: &str, metrics: &HistoricalMetrics) -> Result<()> {
        self.records.insert(id.to_string(), metrics.clone());
        Ok(())
    }
}

/// In-memory selection sink remembering the active identifier.
pub struct MemorySelectionSink {
    active: Mutex<Option<String>>,
}

impl MemorySelectionSink {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    /// The identifier last promoted, if any.
    pub fn active(&self) -> Option<String> {
        self.active.lock().clone()
    }
}

impl Default for MemorySelectionSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionSink for MemorySelectionSink {
    fn set_active(&self, id: &str) -> Result<()> {
        *self.active.lock() = Some(id.to_string());
        Ok(())
    }
}

/// In-memory affiliation store.
pub struct MemoryAffiliationStore {
    flags: DashMap<String, QualityFlag>,
}

impl MemoryAffiliationStore {
    pub fn new() -> Self {
        Self {
            flags: DashMap::new(),
        }
    }
}

impl Default for MemoryAffiliationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AffiliationStore for MemoryAffiliationStore {
    fn quality(&self, id: &str) -> Option<QualityFlag> {
        self.flags.get(id).map(|f| *f)
    }

    fn set_quality(&self, id: &str, flag: QualityFlag) {
        self.flags.insert(id.to_string(), flag);
    }
}
