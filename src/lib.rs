//! Incremental fraud scoring pipeline.
//!
//! Each cycle reads the committed watermark, pulls a bounded batch of
//! transaction events from a queue, scores the ones above the watermark with
//! deterministic rules, commits them to a warehouse, then advances the
//! watermark and acknowledges the batch.

pub mod collaborators;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod rules;
pub mod scheduler;
pub mod storage;
pub mod types;
