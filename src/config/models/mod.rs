//! Configuration data models
//!
//! This module defines all configuration structures used by the batch gateway.

pub mod batch;
pub mod gateway;
pub mod logging;
pub mod server;
pub mod store;

// Re-export all configuration types
pub use batch::*;
pub use gateway::*;
pub use logging::*;
pub use server::*;
pub use store::*;

/// Default values for configuration
pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default server port
pub fn default_port() -> u16 {
    8000
}

/// Default timeout in seconds
pub fn default_timeout() -> u64 {
    30
}

/// Default maximum body size in bytes
pub fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

/// Default service root that relative batch targets resolve against
pub fn default_service_root() -> String {
    "http://localhost:8000/odata/".to_string()
}

pub fn default_max_batch_count() -> i64 {
    100
}

pub fn default_max_changeset_count() -> i64 {
    1000
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_entity_sets() -> Vec<String> {
    vec![
        "Customers".to_string(),
        "Orders".to_string(),
        "Products".to_string(),
    ]
}
