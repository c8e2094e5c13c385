//! Batch protocol configuration

use super::*;
use crate::core::batch::{BatchError, Limits, ProcessorSettings};
use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Batch endpoint configuration
///
/// Limits are kept as signed integers so that a negative value in the file is
/// reported instead of failing deserialization with a less useful message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Absolute URL of the OData service root
    #[serde(default = "default_service_root")]
    pub service_root: String,
    /// Maximum number of top-level elements per batch
    #[serde(default = "default_max_batch_count")]
    pub max_batch_count: i64,
    /// Maximum number of operations per changeset
    #[serde(default = "default_max_changeset_count")]
    pub max_changeset_count: i64,
    /// Execute top-level elements concurrently
    #[serde(default)]
    pub concurrent_elements: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            service_root: default_service_root(),
            max_batch_count: default_max_batch_count(),
            max_changeset_count: default_max_changeset_count(),
            concurrent_elements: false,
        }
    }
}

impl BatchConfig {
    /// Validated limits
    pub fn limits(&self) -> std::result::Result<Limits, BatchError> {
        Limits::new(self.max_batch_count, self.max_changeset_count)
    }

    /// Parsed service root, with a trailing `/`
    pub fn service_root_url(&self) -> Result<Url> {
        let url = Url::parse(&self.service_root).map_err(|e| {
            GatewayError::config(format!(
                "Invalid batch service_root '{}': {}",
                self.service_root, e
            ))
        })?;
        Ok(crate::core::batch::normalize_service_root(url))
    }

    /// Build processor settings from this section
    pub fn processor_settings(&self) -> Result<ProcessorSettings> {
        Ok(ProcessorSettings::new(self.service_root_url()?)
            .with_limits(self.limits()?)
            .with_concurrent_elements(self.concurrent_elements))
    }

    /// Merge batch configurations
    pub fn merge(mut self, other: Self) -> Self {
        if other.service_root != default_service_root() {
            self.service_root = other.service_root;
        }
        if other.max_batch_count != default_max_batch_count() {
            self.max_batch_count = other.max_batch_count;
        }
        if other.max_changeset_count != default_max_changeset_count() {
            self.max_changeset_count = other.max_changeset_count;
        }
        if other.concurrent_elements {
            self.concurrent_elements = true;
        }
        self
    }
}
