//! Multipart batch response serializer

use super::error::BatchError;
use super::hook::{ErrorContext, ErrorHook, ErrorStage};
use super::parser::{APPLICATION_HTTP, MULTIPART_MIXED};
use super::scanner::is_token_byte;
use super::types::{ElementOutcome, OperationResult};
use crate::utils::error::ErrorResponse;
use actix_web::http::StatusCode;
use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;
use uuid::Uuid;

/// Prefix of the generated outer response boundary
pub const BATCH_RESPONSE_PREFIX: &str = "batchresponse_";
/// Prefix of generated changeset response boundaries
pub const CHANGESET_RESPONSE_PREFIX: &str = "changesetresponse_";

const CRLF: &[u8] = b"\r\n";

/// Serialized `$batch` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResponse {
    /// Always 202 Accepted
    pub status: u16,
    pub boundary: String,
    pub body: Bytes,
}

impl BatchResponse {
    pub fn content_type(&self) -> String {
        format!("{}; boundary={}", MULTIPART_MIXED, self.boundary)
    }
}

/// Renders element outcomes into one multipart/mixed body
///
/// A result that cannot be rendered (bad header, bad status) is replaced by
/// a generic 500 part so the remaining parts still reach the client.
pub struct ResponseSerializer<'a> {
    batch_id: &'a str,
    hook: &'a dyn ErrorHook,
}

impl<'a> ResponseSerializer<'a> {
    pub fn new(batch_id: &'a str, hook: &'a dyn ErrorHook) -> Self {
        Self { batch_id, hook }
    }

    pub fn serialize(&self, outcomes: &[ElementOutcome]) -> BatchResponse {
        let boundary = format!("{}{}", BATCH_RESPONSE_PREFIX, Uuid::new_v4());
        let mut body = BytesMut::with_capacity(512 * outcomes.len().max(1));

        for (index, outcome) in outcomes.iter().enumerate() {
            put_delimiter(&mut body, &boundary);
            match outcome {
                ElementOutcome::Single(result) => self.put_operation(&mut body, result, index, None),
                ElementOutcome::Changeset(results) => self.put_changeset(&mut body, results, index),
            }
            body.put_slice(CRLF);
        }
        put_terminator(&mut body, &boundary);

        debug!(parts = outcomes.len(), bytes = body.len(), "Batch response serialized");

        BatchResponse {
            status: StatusCode::ACCEPTED.as_u16(),
            boundary,
            body: body.freeze(),
        }
    }

    fn put_changeset(&self, out: &mut BytesMut, results: &[OperationResult], index: usize) {
        let boundary = format!("{}{}", CHANGESET_RESPONSE_PREFIX, Uuid::new_v4());

        put_raw_header(
            out,
            "Content-Type",
            &format!("{}; boundary={}", MULTIPART_MIXED, boundary),
        );
        out.put_slice(CRLF);

        for (position, result) in results.iter().enumerate() {
            put_delimiter(out, &boundary);
            self.put_operation(out, result, index, Some(position));
            out.put_slice(CRLF);
        }
        put_terminator(out, &boundary);
    }

    fn put_operation(
        &self,
        out: &mut BytesMut,
        result: &OperationResult,
        element: usize,
        operation: Option<usize>,
    ) {
        match render_operation(result) {
            Ok(part) => out.put_slice(&part),
            Err(error) => {
                let context = ErrorContext {
                    batch_id: self.batch_id.to_string(),
                    stage: ErrorStage::Serialization,
                    element,
                    operation,
                };
                self.hook.on_error(&context, &error);
                put_fallback_part(out);
            }
        }
    }
}

/// Render one `application/http` part, headers through body
fn render_operation(result: &OperationResult) -> Result<BytesMut, BatchError> {
    let mut part = BytesMut::with_capacity(256 + result.body.len());

    put_header(&mut part, "Content-Type", APPLICATION_HTTP)?;
    put_header(&mut part, "Content-Transfer-Encoding", "binary")?;
    if let Some(content_id) = &result.content_id {
        put_header(&mut part, "Content-ID", content_id)?;
    }
    part.put_slice(CRLF);

    part.put_slice(status_line(result.status)?.as_bytes());
    for (name, value) in result
        .headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("Content-Length"))
    {
        put_header(&mut part, name, value)?;
    }
    if !result.body.is_empty() {
        put_header(&mut part, "Content-Length", &result.body.len().to_string())?;
    }
    part.put_slice(CRLF);
    part.put_slice(&result.body);

    Ok(part)
}

fn status_line(status: u16) -> Result<String, BatchError> {
    if !(100..=599).contains(&status) {
        return Err(BatchError::Serialization(format!(
            "invalid status code {}",
            status
        )));
    }
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("");
    Ok(format!("HTTP/1.1 {} {}\r\n", status, reason))
}

fn put_header(out: &mut BytesMut, name: &str, value: &str) -> Result<(), BatchError> {
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return Err(BatchError::Serialization(format!(
            "invalid header name '{}'",
            name.escape_debug()
        )));
    }
    if value.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(BatchError::Serialization(format!(
            "header '{}' contains a line break",
            name
        )));
    }
    put_raw_header(out, name, value);
    Ok(())
}

fn put_raw_header(out: &mut BytesMut, name: &str, value: &str) {
    out.put_slice(name.as_bytes());
    out.put_slice(b": ");
    out.put_slice(value.as_bytes());
    out.put_slice(CRLF);
}

fn put_delimiter(out: &mut BytesMut, boundary: &str) {
    out.put_slice(b"--");
    out.put_slice(boundary.as_bytes());
    out.put_slice(CRLF);
}

fn put_terminator(out: &mut BytesMut, boundary: &str) {
    out.put_slice(b"--");
    out.put_slice(boundary.as_bytes());
    out.put_slice(b"--");
    out.put_slice(CRLF);
}

fn put_fallback_part(out: &mut BytesMut) {
    let body = ErrorResponse::new(
        "SERIALIZATION_ERROR",
        "Failed to serialize batch response part",
    )
    .to_json_bytes();

    put_raw_header(out, "Content-Type", APPLICATION_HTTP);
    put_raw_header(out, "Content-Transfer-Encoding", "binary");
    out.put_slice(CRLF);
    out.put_slice(b"HTTP/1.1 500 Internal Server Error\r\n");
    put_raw_header(out, "Content-Type", "application/json");
    put_raw_header(out, "Content-Length", &body.len().to_string());
    out.put_slice(CRLF);
    out.put_slice(&body);
}
