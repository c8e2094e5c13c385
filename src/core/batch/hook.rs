//! Error hook invoked for non-fatal batch errors

use super::error::BatchError;
use std::fmt;
use tracing::warn;

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Validation,
    Execution,
    Serialization,
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStage::Validation => write!(f, "validation"),
            ErrorStage::Execution => write!(f, "execution"),
            ErrorStage::Serialization => write!(f, "serialization"),
        }
    }
}

/// Where in the batch an error happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub batch_id: String,
    pub stage: ErrorStage,
    /// Top-level element index
    pub element: usize,
    /// Operation index inside a changeset
    pub operation: Option<usize>,
}

/// Receives errors that are reported inside the response instead of failing it
///
/// One element can trigger the hook twice: once for its original failure and
/// once more if that failure cannot be rendered.
pub trait ErrorHook: Send + Sync {
    fn on_error(&self, context: &ErrorContext, error: &BatchError);
}

/// Default hook: log through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorHook;

impl ErrorHook for TracingErrorHook {
    fn on_error(&self, context: &ErrorContext, error: &BatchError) {
        warn!(
            batch_id = %context.batch_id,
            stage = %context.stage,
            element = context.element,
            operation = ?context.operation,
            code = error.code(),
            "Batch element error: {}",
            error
        );
    }
}
