//! Selection Sink Port
//!
//! Receives the promoted identifier and makes it the active endpoint.

use anyhow::Result;

/// External facility that activates the winning endpoint.
pub trait SelectionSink: Send + Sync {
    /// Promote an identifier as the currently active endpoint.
    fn set_active(&self, id: &str) -> Result<()>;
}
