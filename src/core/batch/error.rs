//! Batch protocol error taxonomy

use thiserror::Error;

/// Errors raised while parsing, validating, executing or rendering a batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// The request Content-Type cannot carry a batch envelope
    #[error("Invalid batch content type: {0}")]
    InvalidContentType(String),

    /// The multipart envelope is structurally broken
    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    /// A bare top-level operation uses a method other than GET
    #[error("Top-level operation {index} uses method {method}; only GET is allowed outside a changeset")]
    InvalidTopLevelMethod { index: usize, method: String },

    /// A changeset contains a GET operation
    #[error("Operation {operation} of changeset {changeset} uses GET; changesets only accept modifying operations")]
    InvalidChangesetMethod { changeset: usize, operation: usize },

    /// Two operations of one changeset share a Content-ID
    #[error("Duplicate Content-ID '{content_id}' in changeset {changeset}")]
    DuplicateContentId { changeset: usize, content_id: String },

    /// More top-level elements than MaxBatchCount
    #[error("Batch contains {actual} elements, exceeding the limit of {limit}")]
    BatchCountExceeded { limit: usize, actual: usize },

    /// More operations in one changeset than MaxChangesetCount
    #[error("Changeset contains {actual} operations, exceeding the limit of {limit}")]
    ChangesetCountExceeded { limit: usize, actual: usize },

    /// A configured limit is negative
    #[error("Invalid limit configuration: {name} = {value}; limits must not be negative")]
    InvalidLimitConfiguration { name: &'static str, value: i64 },

    /// A `$<Content-ID>` target has no earlier successful operation to point at
    #[error("Content-ID reference '${0}' cannot be resolved")]
    UnresolvedContentId(String),

    /// An operation target cannot be turned into a URI
    #[error("Invalid operation target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// An operation inside a changeset returned a non-success status
    #[error("Changeset operation {operation} failed with status {status}")]
    ChangesetFailed { operation: usize, status: u16 },

    /// A result could not be rendered into the multipart response
    #[error("Failed to serialize batch response part: {0}")]
    Serialization(String),

    /// The operation dispatcher itself failed
    #[error("Dispatcher error: {0}")]
    Dispatch(String),
}

impl BatchError {
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedBatch(message.into())
    }

    pub fn content_type<S: Into<String>>(message: S) -> Self {
        Self::InvalidContentType(message.into())
    }

    pub fn dispatch<S: Into<String>>(message: S) -> Self {
        Self::Dispatch(message.into())
    }

    /// HTTP status used when this error is reported to the client
    pub fn status_code(&self) -> u16 {
        match self {
            BatchError::InvalidContentType(_)
            | BatchError::MalformedBatch(_)
            | BatchError::InvalidTopLevelMethod { .. }
            | BatchError::InvalidChangesetMethod { .. }
            | BatchError::DuplicateContentId { .. }
            | BatchError::BatchCountExceeded { .. }
            | BatchError::ChangesetCountExceeded { .. }
            | BatchError::UnresolvedContentId(_)
            | BatchError::InvalidTarget { .. } => 400,
            BatchError::ChangesetFailed { status, .. } => *status,
            BatchError::InvalidLimitConfiguration { .. }
            | BatchError::Serialization(_)
            | BatchError::Dispatch(_) => 500,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            BatchError::InvalidContentType(_) => "INVALID_CONTENT_TYPE",
            BatchError::MalformedBatch(_) => "MALFORMED_BATCH",
            BatchError::InvalidTopLevelMethod { .. } => "INVALID_TOP_LEVEL_METHOD",
            BatchError::InvalidChangesetMethod { .. } => "INVALID_CHANGESET_METHOD",
            BatchError::DuplicateContentId { .. } => "DUPLICATE_CONTENT_ID",
            BatchError::BatchCountExceeded { .. } => "BATCH_COUNT_EXCEEDED",
            BatchError::ChangesetCountExceeded { .. } => "CHANGESET_COUNT_EXCEEDED",
            BatchError::InvalidLimitConfiguration { .. } => "INVALID_LIMIT_CONFIGURATION",
            BatchError::UnresolvedContentId(_) => "UNRESOLVED_CONTENT_ID",
            BatchError::InvalidTarget { .. } => "INVALID_TARGET",
            BatchError::ChangesetFailed { .. } => "CHANGESET_FAILED",
            BatchError::Serialization(_) => "SERIALIZATION_ERROR",
            BatchError::Dispatch(_) => "DISPATCH_ERROR",
        }
    }

    /// Whether the error aborts the whole batch before any execution
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BatchError::InvalidContentType(_)
                | BatchError::MalformedBatch(_)
                | BatchError::InvalidTopLevelMethod { .. }
                | BatchError::InvalidChangesetMethod { .. }
                | BatchError::DuplicateContentId { .. }
        )
    }

    /// Whether the error replaces one element inside an otherwise accepted batch
    pub fn is_limit_violation(&self) -> bool {
        matches!(
            self,
            BatchError::BatchCountExceeded { .. } | BatchError::ChangesetCountExceeded { .. }
        )
    }
}
