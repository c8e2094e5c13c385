//! Changeset execution with all-or-nothing semantics

use super::super::error::BatchError;
use super::super::hook::ErrorStage;
use super::super::types::{Changeset, ElementOutcome, OperationResult};
use super::core::BatchProcessor;
use super::execution::resolve_uri;
use std::collections::HashMap;
use tracing::{debug, info};
use url::Url;

/// Locations of changeset operations that carried a Content-ID
///
/// Scoped to one changeset; an id only becomes resolvable once its operation
/// has succeeded.
#[derive(Debug, Clone, Default)]
pub(crate) struct ContentIdReferences {
    locations: HashMap<String, Url>,
}

impl ContentIdReferences {
    pub(crate) fn record(&mut self, content_id: &str, location: Url) {
        self.locations.insert(content_id.to_string(), location);
    }

    pub(crate) fn get(&self, content_id: &str) -> Option<&Url> {
        self.locations.get(content_id)
    }
}

impl BatchProcessor {
    /// Run a changeset inside one transaction scope
    ///
    /// Any failure rolls the scope back and collapses the whole changeset into
    /// a single failure result.
    pub(super) async fn execute_changeset(
        &self,
        batch_id: &str,
        index: usize,
        changeset: &Changeset,
    ) -> ElementOutcome {
        let scope = match self.dispatcher.begin().await {
            Ok(scope) => scope,
            Err(error) => {
                self.report(batch_id, ErrorStage::Execution, index, None, &error);
                return ElementOutcome::Single(
                    OperationResult::from_error(&error).into_changeset_failure(),
                );
            }
        };
        debug!(
            changeset = index,
            scope = %scope.id(),
            operations = changeset.operations.len(),
            "Changeset transaction opened"
        );

        let mut references = ContentIdReferences::default();
        let mut results = Vec::with_capacity(changeset.operations.len());

        for (position, operation) in changeset.operations.iter().enumerate() {
            let failure = match self.run_operation(operation, Some(&scope), &references).await {
                Ok((url, response)) if response.is_success() => {
                    if let Some(content_id) = &operation.content_id {
                        let location = response
                            .headers
                            .get("Location")
                            .and_then(|location| {
                                resolve_uri(location, &self.settings.service_root).ok()
                            })
                            .unwrap_or(url);
                        references.record(content_id, location);
                    }
                    results.push(
                        OperationResult::from_response(response)
                            .with_content_id(operation.content_id.clone()),
                    );
                    continue;
                }
                Ok((_, response)) => {
                    let error = BatchError::ChangesetFailed {
                        operation: position,
                        status: response.status,
                    };
                    self.report(batch_id, ErrorStage::Execution, index, Some(position), &error);
                    if response.body.is_empty() {
                        OperationResult::from_error(&error)
                    } else {
                        OperationResult::from_response(response)
                    }
                }
                Err(error) => {
                    self.report(batch_id, ErrorStage::Execution, index, Some(position), &error);
                    OperationResult::from_error(&error)
                }
            };

            if let Err(error) = self.dispatcher.rollback(scope).await {
                self.report(batch_id, ErrorStage::Execution, index, Some(position), &error);
            }
            info!(
                changeset = index,
                operation = position,
                status = failure.status,
                "Changeset rolled back"
            );
            return ElementOutcome::Single(failure.into_changeset_failure());
        }

        if let Err(error) = self.dispatcher.commit(scope).await {
            self.report(batch_id, ErrorStage::Execution, index, None, &error);
            return ElementOutcome::Single(
                OperationResult::from_error(&error).into_changeset_failure(),
            );
        }
        debug!(changeset = index, "Changeset committed");

        ElementOutcome::Changeset(results)
    }
}
