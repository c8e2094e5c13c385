//! Integration tests
//!
//! These tests drive the public API end to end: request bytes in, multipart
//! response out, with the in-memory store as the backing service.

pub mod config_validation_tests;
pub mod error_handling_tests;
pub mod pipeline_tests;
