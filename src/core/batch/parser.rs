//! Batch envelope parser
//!
//! Turns the outer multipart segments into a typed [`Envelope`]. Changesets are
//! scanned recursively with their own boundary, one level deep.

use super::error::BatchError;
use super::scanner::{PartScanner, RawPart};
use super::types::{Changeset, Element, Envelope, Headers, Operation, Target};
use crate::utils::net::ContentType;
use bytes::Bytes;
use tracing::debug;

pub(crate) const MULTIPART_MIXED: &str = "multipart/mixed";
pub(crate) const APPLICATION_HTTP: &str = "application/http";
/// RFC 2046 limit on boundary length
const MAX_BOUNDARY_LEN: usize = 70;

/// Extract the boundary token from a `multipart/mixed` Content-Type value
///
/// Rejects other media types, a missing or empty `boundary` parameter, and
/// multiple `boundary` parameters that disagree.
pub fn boundary_from_content_type(value: &str) -> Result<String, BatchError> {
    let content_type = ContentType::parse(value);
    if !content_type.is(MULTIPART_MIXED) {
        return Err(BatchError::content_type(format!(
            "expected {}, got '{}'",
            MULTIPART_MIXED, content_type.media_type
        )));
    }

    let mut boundaries = content_type.parameters_named("boundary");
    let boundary = boundaries
        .next()
        .ok_or_else(|| BatchError::content_type("missing boundary parameter"))?;

    if boundaries.any(|other| other != boundary) {
        return Err(BatchError::content_type("conflicting boundary parameters"));
    }
    if boundary.is_empty() {
        return Err(BatchError::content_type("boundary parameter is empty"));
    }
    if boundary.len() > MAX_BOUNDARY_LEN {
        return Err(BatchError::content_type(format!(
            "boundary is longer than {} characters",
            MAX_BOUNDARY_LEN
        )));
    }

    Ok(boundary.to_string())
}

/// Parse a `$batch` request body delimited by `boundary`
pub fn parse_envelope(body: &[u8], boundary: &str) -> Result<Envelope, BatchError> {
    let mut elements = Vec::new();

    for (index, part) in PartScanner::new(body, boundary)?.enumerate() {
        let part = part?;
        let content_type = part_content_type(&part, index)?;

        let element = if content_type.is(MULTIPART_MIXED) {
            Element::Changeset(parse_changeset(&part, boundary, index)?)
        } else if content_type.is(APPLICATION_HTTP) {
            Element::Operation(parse_operation(&part, false)?)
        } else {
            return Err(BatchError::malformed(format!(
                "part {} has unsupported Content-Type '{}'",
                index, content_type.media_type
            )));
        };
        elements.push(element);
    }

    debug!(
        boundary = boundary,
        elements = elements.len(),
        "Parsed batch envelope"
    );

    Ok(Envelope {
        boundary: boundary.to_string(),
        elements,
    })
}

fn part_content_type(part: &RawPart<'_>, index: usize) -> Result<ContentType, BatchError> {
    part.headers
        .get("Content-Type")
        .map(ContentType::parse)
        .ok_or_else(|| BatchError::malformed(format!("part {} has no Content-Type header", index)))
}

fn parse_changeset(
    part: &RawPart<'_>,
    outer_boundary: &str,
    index: usize,
) -> Result<Changeset, BatchError> {
    let raw_type = part.headers.get("Content-Type").unwrap_or_default();
    let boundary = boundary_from_content_type(raw_type)
        .map_err(|e| BatchError::malformed(format!("changeset {}: {}", index, e)))?;

    if boundary == outer_boundary {
        return Err(BatchError::malformed(format!(
            "changeset {} reuses the batch boundary",
            index
        )));
    }

    let mut operations = Vec::new();
    for (position, inner) in PartScanner::new(part.body, &boundary)?.enumerate() {
        let inner = inner?;
        let inner_type = part_content_type(&inner, position)?;

        if inner_type.is(MULTIPART_MIXED) {
            return Err(BatchError::malformed(format!(
                "changeset {} contains a nested changeset",
                index
            )));
        }
        if !inner_type.is(APPLICATION_HTTP) {
            return Err(BatchError::malformed(format!(
                "changeset {} part {} has unsupported Content-Type '{}'",
                index, position, inner_type.media_type
            )));
        }

        operations.push(parse_operation(&inner, true)?);
    }

    Ok(Changeset {
        boundary,
        operations,
    })
}

/// Upper bound on header lines inside one operation
const MAX_OPERATION_HEADERS: usize = 64;

/// Request line and headers of an `application/http` part
struct OperationHead {
    method: String,
    target: String,
    headers: Headers,
    len: usize,
}

/// Parse an `application/http` part into an operation
fn parse_operation(part: &RawPart<'_>, in_changeset: bool) -> Result<Operation, BatchError> {
    let data = part.body;

    let (head, body) = match parse_head(data)? {
        Some(head) => {
            let body = operation_body(&data[head.len..], &head.headers)?;
            (head, body)
        }
        None => {
            // The part delimiter took the blank line that ends a bodiless head
            let mut terminated = data.to_vec();
            if !terminated.ends_with(b"\n") {
                terminated.extend_from_slice(b"\r\n");
            }
            terminated.extend_from_slice(b"\r\n");
            let head = parse_head(&terminated)?
                .ok_or_else(|| BatchError::malformed("operation part has no request line"))?;
            (head, &[][..])
        }
    };

    let content_id = head
        .headers
        .get("Content-ID")
        .or_else(|| part.headers.get("Content-ID"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    Ok(Operation {
        method: head.method,
        target: Target::parse(&head.target, in_changeset),
        headers: head.headers,
        content_id,
        body: Bytes::copy_from_slice(body),
    })
}

/// Parse the request line and headers; `None` when the head is not terminated
fn parse_head(data: &[u8]) -> Result<Option<OperationHead>, BatchError> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_OPERATION_HEADERS];
    let mut request = httparse::Request::new(&mut raw_headers);

    let len = match request.parse(data) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => {
            return Err(BatchError::malformed(format!("invalid operation head: {}", e)));
        }
    };

    let (Some(method), Some(target)) = (request.method, request.path) else {
        return Err(BatchError::malformed("operation part has no request line"));
    };
    if !method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(BatchError::malformed(format!("invalid method '{}'", method)));
    }

    let mut headers = Headers::new();
    for header in request.headers.iter() {
        let value = std::str::from_utf8(header.value).map_err(|_| {
            BatchError::malformed(format!("header '{}' is not valid UTF-8", header.name))
        })?;
        headers.insert(header.name, value.trim());
    }

    Ok(Some(OperationHead {
        method: method.to_ascii_uppercase(),
        target: target.to_string(),
        headers,
        len,
    }))
}

fn operation_body<'a>(rest: &'a [u8], headers: &Headers) -> Result<&'a [u8], BatchError> {
    match headers.get("Content-Length") {
        Some(length) => {
            let length: usize = length.trim().parse().map_err(|_| {
                BatchError::malformed(format!("invalid operation Content-Length '{}'", length))
            })?;
            rest.get(..length)
                .ok_or_else(|| BatchError::malformed("operation body is shorter than its Content-Length"))
        }
        None => Ok(rest),
    }
}
