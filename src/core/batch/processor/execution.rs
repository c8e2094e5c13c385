//! Element execution

use super::super::error::BatchError;
use super::super::hook::ErrorStage;
use super::super::types::{Element, ElementOutcome, Envelope, Operation, OperationResult, Target};
use super::super::validation::ElementVerdict;
use super::changeset::ContentIdReferences;
use super::core::BatchProcessor;
use crate::core::traits::{OperationRequest, OperationResponse, TransactionScope};
use futures::future::join_all;
use tracing::debug;
use url::Url;

impl BatchProcessor {
    /// Execute every element; the outcome list mirrors the element order
    pub(super) async fn execute(
        &self,
        batch_id: &str,
        envelope: &Envelope,
        verdicts: &[ElementVerdict],
    ) -> Vec<ElementOutcome> {
        let elements = envelope.elements.iter().zip(verdicts).enumerate();

        if self.settings.concurrent_elements {
            join_all(elements.map(|(index, (element, verdict))| {
                self.execute_element(batch_id, index, element, verdict)
            }))
            .await
        } else {
            let mut outcomes = Vec::with_capacity(envelope.elements.len());
            for (index, (element, verdict)) in elements {
                outcomes.push(self.execute_element(batch_id, index, element, verdict).await);
            }
            outcomes
        }
    }

    async fn execute_element(
        &self,
        batch_id: &str,
        index: usize,
        element: &Element,
        verdict: &ElementVerdict,
    ) -> ElementOutcome {
        if let ElementVerdict::Reject(error) = verdict {
            self.report(batch_id, ErrorStage::Validation, index, None, error);
            let result = OperationResult::from_error(error);
            return ElementOutcome::Single(match element {
                Element::Changeset(_) => result.into_changeset_failure(),
                Element::Operation(operation) => result.with_content_id(operation.content_id.clone()),
            });
        }

        match element {
            Element::Operation(operation) => {
                ElementOutcome::Single(self.execute_single(batch_id, index, operation).await)
            }
            Element::Changeset(changeset) => {
                self.execute_changeset(batch_id, index, changeset).await
            }
        }
    }

    async fn execute_single(
        &self,
        batch_id: &str,
        index: usize,
        operation: &Operation,
    ) -> OperationResult {
        let references = ContentIdReferences::default();
        let result = match self.run_operation(operation, None, &references).await {
            Ok((_, response)) => OperationResult::from_response(response),
            Err(error) => {
                self.report(batch_id, ErrorStage::Execution, index, None, &error);
                OperationResult::from_error(&error)
            }
        };
        result.with_content_id(operation.content_id.clone())
    }

    /// Resolve the target and hand the operation to the dispatcher
    ///
    /// Returns the resolved request URL next to the response so the caller
    /// can record Content-ID locations.
    pub(super) async fn run_operation(
        &self,
        operation: &Operation,
        scope: Option<&TransactionScope>,
        references: &ContentIdReferences,
    ) -> Result<(Url, OperationResponse), BatchError> {
        let url = resolve_target(&operation.target, &self.settings.service_root, references)?;
        debug!(method = %operation.method, url = %url, "Dispatching batch operation");

        let request = OperationRequest {
            method: operation.method.clone(),
            url,
            headers: operation.headers.clone(),
            body: operation.body.clone(),
        };
        let response = self.dispatcher.dispatch(&request, scope).await?;
        Ok((request.url, response))
    }
}

/// Resolve a plain target against the service root
///
/// Absolute URIs pass through. A leading `/` is read as relative to the
/// service root unless the target already carries the root's path.
pub(super) fn resolve_uri(raw: &str, service_root: &Url) -> Result<Url, BatchError> {
    let invalid = |reason: String| BatchError::InvalidTarget {
        target: raw.to_string(),
        reason,
    };

    if let Ok(url) = Url::parse(raw) {
        return Ok(url);
    }

    let root_path = service_root.path();
    let relative = if raw.starts_with('/') && !raw.starts_with(root_path) {
        raw.trim_start_matches('/')
    } else {
        raw
    };

    service_root
        .join(relative)
        .map_err(|e| invalid(e.to_string()))
}

/// Resolve a target, looking references up in `references`
pub(super) fn resolve_target(
    target: &Target,
    service_root: &Url,
    references: &ContentIdReferences,
) -> Result<Url, BatchError> {
    match target {
        Target::Uri(raw) => resolve_uri(raw, service_root),
        Target::Reference { content_id, rest } => {
            let base = references
                .get(content_id)
                .ok_or_else(|| BatchError::UnresolvedContentId(content_id.clone()))?;
            let joined = format!("{}{}", base.as_str().trim_end_matches('/'), rest);
            Url::parse(&joined).map_err(|e| BatchError::InvalidTarget {
                target: target.to_string(),
                reason: e.to_string(),
            })
        }
    }
}
