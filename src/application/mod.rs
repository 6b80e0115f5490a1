//! Application Layer
//!
//! Use-case orchestration over the domain ports.

mod selector_service;

pub use selector_service::SelectorService;
