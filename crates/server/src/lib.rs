//! HTTP service exposing the batch enrichment engine.

pub mod api;
pub mod metrics;
pub mod state;
