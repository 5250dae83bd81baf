//! polydash: prediction-market trading dashboard with paper execution.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], async orchestration in [`services`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod services;
pub mod cli;
