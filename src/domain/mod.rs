//! Core domain types and logic.
//!
//! Nothing in here performs I/O; adapters feed data in through the traits
//! in [`crate::ports`].

pub mod error;
pub mod execution;
pub mod market;
pub mod metrics;
pub mod portfolio;
pub mod position;
pub mod settings;
pub mod signal;
pub mod trade;
