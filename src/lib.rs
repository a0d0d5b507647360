//! Incremental SOL → USDC sell agent.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod error;
pub mod wallet;
pub mod chain;
pub mod aggregator;
pub mod notify;
pub mod journal;
pub mod engine;
