//! Adapters Layer
//!
//! Inbound adapters drive the application service; outbound adapters
//! implement the domain ports.

pub mod inbound;
pub mod outbound;
