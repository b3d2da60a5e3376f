//! SignalTrack Library
//!
//! Trade signal lifecycle and performance analytics engine

pub mod config;
pub mod driver;
pub mod ingest;
pub mod ledger;
pub mod market;
pub mod predictor;
pub mod resolution;
pub mod stats;
pub mod store;
pub mod types;
