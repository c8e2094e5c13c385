//! HTTP route handlers
//!
//! This module provides HTTP route handler functions.

use actix_web::HttpResponse;
use serde_json::json;

/// Health check endpoint handler
pub async fn health_check() -> HttpResponse {
    let build = crate::build_info();
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": build.version,
        "build": {
            "time": build.build_time,
            "git_hash": build.git_hash,
            "rust_version": build.rust_version
        }
    }))
}
