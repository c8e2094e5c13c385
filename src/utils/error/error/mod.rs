//! Error handling for the gateway
//!
//! This module defines the service-level error type and its HTTP rendering.

mod conversions;
mod helpers;
mod response;
mod types;

pub use response::{ErrorDetail, ErrorResponse};
pub use types::{GatewayError, Result};
