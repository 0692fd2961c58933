//! Infrastructure Layer - External Technology Stack
//!
//! This module contains concrete implementations that depend on
//! external libraries and systems.
//!
//! # Responsibilities
//! - Scenario documents (JSON via `serde_json`)
//! - Filesystem access for loading them

pub mod scenario;

// Re-exports
pub use scenario::{Scenario, ScenarioError};
