//! Application state shared across HTTP handlers
//!
//! This module provides the AppState struct and its implementations.

use crate::config::Config;
use crate::core::batch::BatchProcessor;
use crate::core::traits::OperationDispatcher;
use crate::utils::error::Result;
use std::sync::Arc;

/// HTTP server state shared across handlers
///
/// All fields are wrapped in Arc for sharing across worker threads.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration (shared read-only)
    pub config: Arc<Config>,
    /// Batch processor bound to the configured dispatcher
    pub processor: Arc<BatchProcessor>,
}

impl AppState {
    /// Create a new AppState, validating batch settings
    pub fn new(config: Config, dispatcher: Arc<dyn OperationDispatcher>) -> Result<Self> {
        let settings = config.batch().processor_settings()?;
        Ok(Self {
            config: Arc::new(config),
            processor: Arc::new(BatchProcessor::new(dispatcher, settings)),
        })
    }

    /// Path of the batch endpoint, under the service root path
    pub fn batch_path(&self) -> String {
        format!("{}$batch", self.processor.settings().service_root.path())
    }
}
