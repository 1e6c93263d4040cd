//! Batch orchestration for the opportunity pipeline: configuration,
//! persistence, run journal and the per-item processing loop. The binary
//! in `main.rs` wires these together.

pub mod config;
pub mod journal;
pub mod pipeline;
pub mod store;
