//! Result construction and error reporting helpers

use super::super::error::BatchError;
use super::super::hook::{ErrorContext, ErrorStage};
use super::super::types::{Headers, OperationResult};
use super::core::BatchProcessor;
use crate::core::traits::OperationResponse;
use crate::utils::error::ErrorResponse;
use bytes::Bytes;

impl OperationResult {
    /// Wrap a dispatcher response as-is
    pub(crate) fn from_response(response: OperationResponse) -> Self {
        Self::new(response.status, response.headers, response.body)
    }

    /// Build a JSON error result from a batch error
    pub(crate) fn from_error(error: &BatchError) -> Self {
        let body = ErrorResponse::new(error.code(), error.to_string()).to_json_bytes();

        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");

        Self::new(error.status_code(), headers, Bytes::from(body))
    }

    pub(crate) fn with_content_id(mut self, content_id: Option<String>) -> Self {
        self.content_id = content_id;
        self
    }

    /// Mark as the single result standing in for a failed changeset
    pub(crate) fn into_changeset_failure(mut self) -> Self {
        self.is_changeset_failure = true;
        self.content_id = None;
        self
    }
}

impl BatchProcessor {
    /// Hand a non-fatal error to the configured hook
    pub(super) fn report(
        &self,
        batch_id: &str,
        stage: ErrorStage,
        element: usize,
        operation: Option<usize>,
        error: &BatchError,
    ) {
        let context = ErrorContext {
            batch_id: batch_id.to_string(),
            stage,
            element,
            operation,
        };
        self.hook.on_error(&context, error);
    }
}
