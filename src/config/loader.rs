//! Configuration loading utilities
//!
//! Environment overrides are applied on top of file or default values.

use super::models::*;
use crate::utils::error::{GatewayError, Result};
use std::env;
use std::str::FromStr;
use tracing::debug;

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        debug!("Loading configuration from environment variables");
        let mut config = Self::default();
        config.apply_env_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `BATCH_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("BATCH_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("BATCH_PORT") {
            self.server.port = parse_var("BATCH_PORT", &port)?;
        }
        if let Some(root) = lookup("BATCH_SERVICE_ROOT") {
            self.batch.service_root = root;
        }
        if let Some(count) = lookup("BATCH_MAX_BATCH_COUNT") {
            self.batch.max_batch_count = parse_var("BATCH_MAX_BATCH_COUNT", &count)?;
        }
        if let Some(count) = lookup("BATCH_MAX_CHANGESET_COUNT") {
            self.batch.max_changeset_count = parse_var("BATCH_MAX_CHANGESET_COUNT", &count)?;
        }
        if let Some(flag) = lookup("BATCH_CONCURRENT_ELEMENTS") {
            self.batch.concurrent_elements = parse_var("BATCH_CONCURRENT_ELEMENTS", &flag)?;
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| GatewayError::config(format!("Invalid {} '{}': {}", name, value, e)))
}
