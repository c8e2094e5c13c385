//! Common test utilities for odata-batch
//!
//! - Batch request builders and multipart response parsing
//! - A recording dispatcher wrapping the in-memory store


// Re-export commonly used items
pub use dispatcher::{DispatcherEvent, RecordingDispatcher};
pub use fixtures::{BatchBuilder, ChangesetBuilder, ParsedPart, parse_multipart, parse_response};

/// Service root used across the integration tests
pub const SERVICE_ROOT: &str = "http://localhost:8000/odata/";

/// Assert that a result is Ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a result is Err
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(_) => panic!("Expected Err, got Ok"),
            Err(e) => e,
        }
    };
}
