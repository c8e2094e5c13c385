//! Type conversions for GatewayError

use super::types::GatewayError;

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::Config(format!("Invalid URL: {}", err))
    }
}

impl From<actix_web::error::PayloadError> for GatewayError {
    fn from(err: actix_web::error::PayloadError) -> Self {
        GatewayError::BadRequest(format!("Failed to read request body: {}", err))
    }
}
