//! OData batch gateway
//!
//! Serves `$batch` requests against the in-memory reference store

use clap::Parser;
use odata_batch::server;
use std::path::PathBuf;
use std::process::ExitCode;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "batch-gateway", version, about = "OData $batch gateway")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "BATCH_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match server::builder::run_server(cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Print error using Display (not Debug) to preserve newlines
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
