//! Batch processor: parse, validate, execute and render one `$batch` request

use super::super::error::BatchError;
use super::super::hook::{ErrorHook, TracingErrorHook};
use super::super::parser::{boundary_from_content_type, parse_envelope};
use super::super::serializer::{BatchResponse, ResponseSerializer};
use super::super::validation::validate_envelope;
use super::super::types::Limits;
use crate::core::traits::OperationDispatcher;
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};
use url::Url;
use uuid::Uuid;

/// Per-service processor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSettings {
    pub limits: Limits,
    /// Base for relative operation targets; always ends with `/`
    pub service_root: Url,
    /// Run top-level elements concurrently (responses stay in request order)
    pub concurrent_elements: bool,
}

impl ProcessorSettings {
    pub fn new(service_root: Url) -> Self {
        Self {
            limits: Limits::default(),
            service_root: normalize_service_root(service_root),
            concurrent_elements: false,
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_concurrent_elements(mut self, concurrent: bool) -> Self {
        self.concurrent_elements = concurrent;
        self
    }
}

/// Relative targets are joined onto the root, so the root path must end in `/`
pub fn normalize_service_root(mut root: Url) -> Url {
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root
}

/// Batch processor for `$batch` requests
pub struct BatchProcessor {
    pub(super) dispatcher: Arc<dyn OperationDispatcher>,
    pub(super) settings: ProcessorSettings,
    pub(super) hook: Arc<dyn ErrorHook>,
}

impl BatchProcessor {
    /// Create a new batch processor
    pub fn new(dispatcher: Arc<dyn OperationDispatcher>, settings: ProcessorSettings) -> Self {
        Self {
            dispatcher,
            settings,
            hook: Arc::new(TracingErrorHook),
        }
    }

    /// Replace the default tracing error hook
    pub fn with_error_hook(mut self, hook: Arc<dyn ErrorHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Process one `$batch` request
    ///
    /// `Err` means the request is rejected as a whole (400, no multipart body).
    /// Everything else, including limit violations and failed operations, is
    /// reported inside an accepted multipart response.
    pub async fn process(
        &self,
        content_type: &str,
        body: &[u8],
    ) -> Result<BatchResponse, BatchError> {
        let batch_id = Uuid::new_v4().to_string();
        let span = info_span!("batch", batch_id = %batch_id);

        async move {
            let result = self.process_inner(&batch_id, content_type, body).await;
            if let Err(error) = &result {
                warn!(code = error.code(), "Rejecting batch request: {}", error);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn process_inner(
        &self,
        batch_id: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<BatchResponse, BatchError> {
        let boundary = boundary_from_content_type(content_type)?;
        let envelope = parse_envelope(body, &boundary)?;

        // Limits are read once per request
        let limits = self.settings.limits;
        let verdicts = validate_envelope(&envelope, &limits)?;

        info!(
            elements = envelope.elements.len(),
            operations = envelope.operation_count(),
            "Executing batch"
        );

        let outcomes = self.execute(batch_id, &envelope, &verdicts).await;
        let response = ResponseSerializer::new(batch_id, self.hook.as_ref()).serialize(&outcomes);

        info!(
            status = response.status,
            bytes = response.body.len(),
            "Batch completed"
        );
        Ok(response)
    }
}
