//! Error handling integration tests
//!
//! Tests for how batch errors surface through the service error type.

#[cfg(test)]
mod tests {
    use actix_web::ResponseError;
    use odata_batch::core::batch::BatchError;
    use odata_batch::utils::error::{ErrorResponse, GatewayError};

    fn rendered(error: GatewayError) -> (u16, ErrorResponse) {
        let response = error.error_response();
        let status = response.status().as_u16();
        let body = actix_web::body::to_bytes(response.into_body());
        let bytes = futures::executor::block_on(body).unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    // ==================== Fatal batch errors ====================

    /// Fatal batch errors answer 400 with their own code
    #[test]
    fn test_fatal_batch_error_flow() {
        let cases = [
            (BatchError::content_type("missing boundary"), "INVALID_CONTENT_TYPE"),
            (BatchError::malformed("no terminator"), "MALFORMED_BATCH"),
            (
                BatchError::InvalidTopLevelMethod {
                    index: 0,
                    method: "POST".to_string(),
                },
                "INVALID_TOP_LEVEL_METHOD",
            ),
            (
                BatchError::InvalidChangesetMethod {
                    changeset: 0,
                    operation: 1,
                },
                "INVALID_CHANGESET_METHOD",
            ),
            (
                BatchError::DuplicateContentId {
                    changeset: 0,
                    content_id: "1".to_string(),
                },
                "DUPLICATE_CONTENT_ID",
            ),
        ];

        for (error, code) in cases {
            assert!(error.is_fatal());
            let (status, body) = rendered(error.into());
            assert_eq!(status, 400);
            assert_eq!(body.error.code, code);
            assert!(body.error.timestamp > 0);
        }
    }

    /// Limit configuration problems are server errors
    #[test]
    fn test_limit_configuration_error_flow() {
        let error = BatchError::InvalidLimitConfiguration {
            name: "max_batch_count",
            value: -1,
        };
        assert!(!error.is_fatal());

        let (status, body) = rendered(error.into());
        assert_eq!(status, 500);
        assert_eq!(body.error.code, "INVALID_LIMIT_CONFIGURATION");
        assert!(body.error.message.contains("-1"));
    }

    // ==================== Service errors ====================

    /// Internal details are not leaked to clients
    #[test]
    fn test_internal_error_hides_details() {
        let (status, body) = rendered(GatewayError::internal("lock poisoned at 0x1234"));
        assert_eq!(status, 500);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(!body.error.message.contains("0x1234"));
    }

    #[test]
    fn test_bad_request_error_flow() {
        let (status, body) = rendered(GatewayError::bad_request("payload unreadable"));
        assert_eq!(status, 400);
        assert_eq!(body.error.code, "BAD_REQUEST");
    }

    /// Limit violations are reported in-stream, not as request failures
    #[test]
    fn test_limit_violations_are_not_fatal() {
        let error = BatchError::BatchCountExceeded {
            limit: 1,
            actual: 2,
        };
        assert!(error.is_limit_violation());
        assert!(!error.is_fatal());
        assert_eq!(error.status_code(), 400);
    }
}
