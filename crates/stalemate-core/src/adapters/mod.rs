//! Adapters Layer - Ports & Adapters Pattern
//!
//! This module connects the single-threaded domain engine to callers that
//! share it across threads.
//!
//! # Responsibilities
//! - Serialize access to one `AllocationEngine` behind a lock
//! - Offer the engine's operations as `&self` methods

pub mod shared;

// Re-exports
pub use shared::SharedEngine;
