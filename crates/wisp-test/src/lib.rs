//! Wisp Test Harness - Collaborator doubles and stream validation
//!
//! This crate provides:
//! - An in-memory room directory implementing membership
//! - A recording event sink
//! - A wired-up presence + typing system for end-to-end tests
//! - A seeded multi-threaded workload generator with invariant checks
//! - Scenario suites covering the stream contracts

pub mod harness;
pub mod workload;

#[cfg(test)]
mod scenarios;

pub use harness::*;
pub use workload::*;
