//! Batch processor module
//!
//! The processor is split into logical components:
//! - `core`: `BatchProcessor` struct, settings and the request pipeline
//! - `execution`: element execution and target resolution
//! - `changeset`: transactional changeset execution and Content-ID references
//! - `utils`: result construction and error reporting

pub mod core;
mod changeset;
mod execution;
mod utils;
