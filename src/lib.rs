//! # odata-batch
//!
//! OData `$batch` support for HTTP services: a multipart envelope parser, a
//! validator for batch limits and structure, an execution engine with
//! all-or-nothing changesets and `$<Content-ID>` references, and a multipart
//! response serializer. An actix-web gateway hosts the pipeline in front of
//! any [`OperationDispatcher`](core::traits::OperationDispatcher).
//!
//! ## Processing a batch
//!
//! ```rust,no_run
//! use odata_batch::core::batch::{BatchProcessor, ProcessorSettings};
//! use odata_batch::core::store::InMemoryStore;
//! use std::sync::Arc;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let root = Url::parse("http://localhost:8000/odata/")?;
//!     let store = Arc::new(InMemoryStore::new(root.clone(), ["Customers"]));
//!     let processor = BatchProcessor::new(store, ProcessorSettings::new(root));
//!
//!     let body = "--b\r\nContent-Type: application/http\r\n\r\n\
//!                 GET Customers HTTP/1.1\r\n\r\n\r\n--b--\r\n";
//!     let response = processor
//!         .process("multipart/mixed; boundary=b", body.as_bytes())
//!         .await?;
//!     println!("{}", response.content_type());
//!     Ok(())
//! }
//! ```
//!
//! ## Gateway Mode
//!
//! ```rust,no_run
//! use odata_batch::{Config, Gateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/gateway.yaml").await?;
//!     let gateway = Gateway::new(config)?;
//!     gateway.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod server;
pub mod utils;

// Re-export main types
pub use config::Config;
pub use core::batch::{BatchError, BatchProcessor, BatchResponse, ProcessorSettings};
pub use core::store::InMemoryStore;
pub use core::traits::{OperationDispatcher, OperationRequest, OperationResponse};
pub use utils::error::{GatewayError, Result};

use tracing::info;

/// A batch gateway instance
pub struct Gateway {
    config: Config,
    server: server::server::HttpServer,
}

impl Gateway {
    /// Create a new gateway instance
    pub fn new(config: Config) -> Result<Self> {
        info!("Creating new gateway instance");

        let server = server::server::HttpServer::new(&config)?;

        Ok(Self { config, server })
    }

    /// Run the gateway server
    pub async fn run(self) -> Result<()> {
        info!("Starting OData batch gateway");
        info!("Configuration: {:#?}", self.config);

        self.server.start().await?;

        Ok(())
    }
}

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Description of the crate
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Gateway build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version number
    pub version: &'static str,
    /// Build timestamp (unix seconds)
    pub build_time: &'static str,
    /// Git commit hash
    pub git_hash: &'static str,
    /// Rust version
    pub rust_version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: VERSION,
            build_time: env!("BUILD_TIME"),
            git_hash: env!("GIT_HASH"),
            rust_version: env!("RUST_VERSION"),
        }
    }
}

/// Build information baked in by the build script
pub fn build_info() -> BuildInfo {
    BuildInfo::default()
}
