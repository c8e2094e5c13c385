//! Utility modules for the batch gateway
//!
//! ## Module Organization
//!
//! - **error**: Service-level error type and its HTTP rendering
//! - **logging**: `tracing` subscriber setup
//! - **net**: HTTP header helpers

pub mod error;
pub mod logging;
pub mod net;

use uuid::Uuid;

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
