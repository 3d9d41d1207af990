//! FUNDBRIDGE: cross-venue funding-rate arbitrage monitor
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod venues;
pub mod strategy;
pub mod engine;
pub mod dashboard;
pub mod notify;
