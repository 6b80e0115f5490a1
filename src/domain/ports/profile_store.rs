//! Profile Store Port
//!
//! Defines the interface for endpoint profile lookup and write-back.
//! Implementations may use SQLite or in-memory storage.

use crate::domain::entities::EndpointProfile;
use anyhow::Result;

/// Store for endpoint profiles, keyed by opaque identifier.
///
/// This is an outbound port. The selector reads profiles to probe
/// them and writes exactly one mutation back: the label rewrite on
/// promotion. A write may reassign the identifier; callers must use
/// the returned id thereafter.
pub trait ProfileStore: Send + Sync {
    /// Look up the profile for an identifier.
    fn lookup(&self, id: &str) -> Option<EndpointProfile>;

    /// Write a profile back, returning the (possibly reassigned) id.
    fn write(&self, id: &str, profile: EndpointProfile) -> Result<String>;

    /// Identifiers currently known to the store.
    ///
    /// Serves schedulers and UIs that enumerate candidates; the
    /// selection pipelines themselves only take explicit lists.
    fn candidate_ids(&self) -> Vec<String>;
}
