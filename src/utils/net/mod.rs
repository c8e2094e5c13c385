//! Network utilities
//!
//! This module provides HTTP header helpers shared by the batch pipeline and the
//! HTTP server.

pub mod content_type;

// Re-export commonly used types
pub use content_type::ContentType;
