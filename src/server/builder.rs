//! Server builder and run_server function
//!
//! This module provides the ServerBuilder for easier server configuration
//! and the run_server function for configuration loading and startup.

use crate::config::Config;
use crate::core::traits::OperationDispatcher;
use crate::server::server::HttpServer;
use crate::utils::error::{GatewayError, Result};
use crate::utils::logging::init_tracing;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Server builder for easier configuration
pub struct ServerBuilder {
    config: Option<Config>,
    dispatcher: Option<Arc<dyn OperationDispatcher>>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: None,
            dispatcher: None,
        }
    }

    /// Set configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Serve batches against `dispatcher` instead of the in-memory store
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn OperationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Build the HTTP server
    pub fn build(self) -> Result<HttpServer> {
        let config = self
            .config
            .ok_or_else(|| GatewayError::config("Configuration is required"))?;

        match self.dispatcher {
            Some(dispatcher) => HttpServer::with_dispatcher(&config, dispatcher),
            None => HttpServer::new(&config),
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration, install logging and run the server
pub async fn run_server(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path.as_deref()).await?;
    init_tracing(config.logging())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting OData batch gateway"
    );
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file given, using defaults and environment"),
    }

    let server = ServerBuilder::new().with_config(config).build()?;
    info!("API Endpoints:");
    info!("   POST {} - Batch requests", server.batch_path());
    info!("   GET  /health - Health check");

    server.start().await
}
