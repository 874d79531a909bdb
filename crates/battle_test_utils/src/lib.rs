//! # Battle Test Utilities
//!
//! Shared testing utilities for the battle crates:
//! - Determinism test harness
//! - Fixture battles and configs
//! - Formation spawning
//! - Balance batches
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod balance;
pub mod determinism;
pub mod fixtures;
pub mod formation;

/// Re-export proptest for convenience.
pub use proptest;
