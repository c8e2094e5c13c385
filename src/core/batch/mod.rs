//! OData `$batch` protocol support
//!
//! A batch request is handled in four steps:
//! - [`scanner`] splits a multipart body into raw parts
//! - [`parser`] builds a typed [`Envelope`] from those parts
//! - [`validation`] applies structural rules and request limits
//! - [`BatchProcessor`] executes the elements and renders the multipart response

mod error;
mod hook;
mod parser;
mod processor;
mod scanner;
mod serializer;
mod types;
mod validation;


pub use error::BatchError;
pub use hook::{ErrorContext, ErrorHook, ErrorStage, TracingErrorHook};
pub use parser::{boundary_from_content_type, parse_envelope};
pub use processor::core::{BatchProcessor, ProcessorSettings, normalize_service_root};
pub use scanner::{PartScanner, RawPart};
pub use serializer::{
    BATCH_RESPONSE_PREFIX, BatchResponse, CHANGESET_RESPONSE_PREFIX, ResponseSerializer,
};
pub use types::{
    Changeset, Element, ElementOutcome, Envelope, Headers, Limits, Operation, OperationResult,
    Target,
};
pub use validation::{ElementVerdict, validate_envelope};
