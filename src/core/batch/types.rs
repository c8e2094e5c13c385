//! Batch envelope data model
//!
//! An [`Envelope`] is the parsed form of one `$batch` request body. It is
//! built once by the parser, checked by the validator and then read by the
//! processor; nothing mutates it after parsing.

use super::error::BatchError;
use bytes::Bytes;
use std::fmt;

/// Header map with case-insensitive names
///
/// Insertion order is preserved for rendering. Inserting a name that is
/// already present replaces the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any value stored under the same name
    pub fn insert<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Append to the value of the last inserted header (folded header lines)
    pub(crate) fn extend_last(&mut self, continuation: &str) -> bool {
        match self.entries.last_mut() {
            Some((_, value)) => {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(continuation);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Operation target as written in the request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Relative (to the service root) or absolute URI
    Uri(String),
    /// `$<content_id><rest>`, resolved once the referenced operation has run
    Reference { content_id: String, rest: String },
}

impl Target {
    /// Classify a raw target; `$` references only exist inside changesets
    pub fn parse(raw: &str, in_changeset: bool) -> Self {
        if in_changeset {
            if let Some(reference) = raw.strip_prefix('$') {
                let split = reference.find(['/', '?']).unwrap_or(reference.len());
                let (content_id, rest) = reference.split_at(split);
                if !content_id.is_empty() {
                    return Target::Reference {
                        content_id: content_id.to_string(),
                        rest: rest.to_string(),
                    };
                }
            }
        }
        Target::Uri(raw.to_string())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Target::Reference { .. })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Uri(uri) => write!(f, "{}", uri),
            Target::Reference { content_id, rest } => write!(f, "${}{}", content_id, rest),
        }
    }
}

/// One HTTP-shaped sub-request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub method: String,
    pub target: Target,
    pub headers: Headers,
    pub content_id: Option<String>,
    pub body: Bytes,
}

impl Operation {
    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// Atomic group of modifying operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub boundary: String,
    pub operations: Vec<Operation>,
}

/// Top-level entry of an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Operation(Operation),
    Changeset(Changeset),
}

impl Element {
    pub fn is_changeset(&self) -> bool {
        matches!(self, Element::Changeset(_))
    }
}

/// Parsed `$batch` request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub boundary: String,
    pub elements: Vec<Element>,
}

impl Envelope {
    /// Total number of operations across all elements
    pub fn operation_count(&self) -> usize {
        self.elements
            .iter()
            .map(|element| match element {
                Element::Operation(_) => 1,
                Element::Changeset(changeset) => changeset.operations.len(),
            })
            .sum()
    }
}

/// Validated request limits
///
/// Built from raw configuration integers; a negative raw value is a
/// configuration error, and zero is a hard cap of zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_batch_count: usize,
    pub max_changeset_count: usize,
}

impl Limits {
    pub fn new(max_batch_count: i64, max_changeset_count: i64) -> Result<Self, BatchError> {
        Ok(Self {
            max_batch_count: checked_limit("max_batch_count", max_batch_count)?,
            max_changeset_count: checked_limit("max_changeset_count", max_changeset_count)?,
        })
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_batch_count: 100,
            max_changeset_count: 1000,
        }
    }
}

fn checked_limit(name: &'static str, value: i64) -> Result<usize, BatchError> {
    usize::try_from(value).map_err(|_| BatchError::InvalidLimitConfiguration { name, value })
}

/// Outcome of one operation, or of a whole failed changeset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
    /// Content-ID echoed from the request operation
    pub content_id: Option<String>,
    pub is_changeset_failure: bool,
}

impl OperationResult {
    pub fn new(status: u16, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            content_id: None,
            is_changeset_failure: false,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outcome of one top-level element, in the shape the response takes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementOutcome {
    /// Rendered as a single `application/http` part
    Single(OperationResult),
    /// Rendered as a nested `multipart/mixed` part
    Changeset(Vec<OperationResult>),
}
