//! `$batch` endpoint

use crate::core::batch::BatchError;
use crate::server::middleware::REQUEST_ID_HEADER;
use crate::server::state::AppState;
use crate::utils::error::Result;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{HttpRequest, HttpResponse, web};
use tracing::{Instrument, debug, info_span};

/// Configure the batch route at `path`
pub fn configure_routes(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.route(path, web::post().to(handle_batch));
}

/// Process a multipart batch request
///
/// Answers 202 with a multipart body, or 400 with a JSON error when the
/// request cannot be processed as a batch at all.
pub async fn handle_batch(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .ok_or_else(|| BatchError::content_type("missing Content-Type header"))?
        .to_str()
        .map_err(|_| BatchError::content_type("Content-Type header is not valid ASCII"))?;

    debug!(bytes = body.len(), "Batch request received");

    let response = state
        .processor
        .process(content_type, &body)
        .instrument(info_span!("batch_request", request_id = %request_id))
        .await?;

    Ok(HttpResponse::Accepted()
        .content_type(response.content_type())
        .body(response.body))
}
