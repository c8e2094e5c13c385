//! Limit and structure validation
//!
//! Structural rules are fatal to the whole batch. Limit rules only replace the
//! offending element, so they come back as per-element verdicts.

use super::error::BatchError;
use super::types::{Element, Envelope, Limits};
use std::collections::HashSet;
use tracing::debug;

/// What the processor should do with one top-level element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementVerdict {
    Execute,
    Reject(BatchError),
}

impl ElementVerdict {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ElementVerdict::Reject(_))
    }
}

/// Validate an envelope, returning one verdict per top-level element
pub fn validate_envelope(
    envelope: &Envelope,
    limits: &Limits,
) -> Result<Vec<ElementVerdict>, BatchError> {
    check_top_level_methods(envelope)?;
    check_changeset_methods(envelope)?;
    check_content_ids(envelope)?;

    let verdicts = check_limits(envelope, limits);
    debug!(
        elements = verdicts.len(),
        rejected = verdicts.iter().filter(|v| v.is_rejected()).count(),
        "Batch envelope validated"
    );
    Ok(verdicts)
}

fn check_top_level_methods(envelope: &Envelope) -> Result<(), BatchError> {
    for (index, element) in envelope.elements.iter().enumerate() {
        if let Element::Operation(operation) = element {
            if !operation.is_get() {
                return Err(BatchError::InvalidTopLevelMethod {
                    index,
                    method: operation.method.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_changeset_methods(envelope: &Envelope) -> Result<(), BatchError> {
    for (index, element) in envelope.elements.iter().enumerate() {
        if let Element::Changeset(changeset) = element {
            if let Some(position) = changeset.operations.iter().position(|op| op.is_get()) {
                return Err(BatchError::InvalidChangesetMethod {
                    changeset: index,
                    operation: position,
                });
            }
        }
    }
    Ok(())
}

fn check_content_ids(envelope: &Envelope) -> Result<(), BatchError> {
    for (index, element) in envelope.elements.iter().enumerate() {
        if let Element::Changeset(changeset) = element {
            let mut seen = HashSet::new();
            for content_id in changeset
                .operations
                .iter()
                .filter_map(|op| op.content_id.as_deref())
            {
                if !seen.insert(content_id) {
                    return Err(BatchError::DuplicateContentId {
                        changeset: index,
                        content_id: content_id.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn check_limits(envelope: &Envelope, limits: &Limits) -> Vec<ElementVerdict> {
    let total = envelope.elements.len();

    envelope
        .elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            if index >= limits.max_batch_count {
                return ElementVerdict::Reject(BatchError::BatchCountExceeded {
                    limit: limits.max_batch_count,
                    actual: total,
                });
            }
            match element {
                Element::Changeset(changeset)
                    if changeset.operations.len() > limits.max_changeset_count =>
                {
                    ElementVerdict::Reject(BatchError::ChangesetCountExceeded {
                        limit: limits.max_changeset_count,
                        actual: changeset.operations.len(),
                    })
                }
                _ => ElementVerdict::Execute,
            }
        })
        .collect()
}
