//! Resource path parsing for the in-memory store

use url::Url;

/// Addressed resource, relative to the service root
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ResourcePath {
    /// `/<Set>`
    Collection { set: String },
    /// `/<Set>(<key>)`
    Entity { set: String, key: u64 },
    /// `/<Set>(<key>)/<Nav>`
    Navigation {
        set: String,
        key: u64,
        target: String,
    },
}

/// Why a URL does not address a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum PathError {
    /// Outside the service root or too many segments
    NotFound,
    /// Malformed key literal
    InvalidKey(String),
}

impl ResourcePath {
    pub(super) fn parse(url: &Url, service_root: &Url) -> Result<Self, PathError> {
        if url.origin() != service_root.origin() {
            return Err(PathError::NotFound);
        }
        let relative = url
            .path()
            .strip_prefix(service_root.path())
            .ok_or(PathError::NotFound)?;

        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [segment] => match split_key(segment)? {
                (set, None) => Ok(ResourcePath::Collection { set }),
                (set, Some(key)) => Ok(ResourcePath::Entity { set, key }),
            },
            [segment, target] => match split_key(segment)? {
                (set, Some(key)) if is_identifier(target) => Ok(ResourcePath::Navigation {
                    set,
                    key,
                    target: target.to_string(),
                }),
                _ => Err(PathError::NotFound),
            },
            _ => Err(PathError::NotFound),
        }
    }

    pub(super) fn set(&self) -> &str {
        match self {
            ResourcePath::Collection { set }
            | ResourcePath::Entity { set, .. }
            | ResourcePath::Navigation { set, .. } => set,
        }
    }
}

fn split_key(segment: &str) -> Result<(String, Option<u64>), PathError> {
    let Some(open) = segment.find('(') else {
        return if is_identifier(segment) {
            Ok((segment.to_string(), None))
        } else {
            Err(PathError::NotFound)
        };
    };

    let name = &segment[..open];
    let literal = segment[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| PathError::InvalidKey(segment.to_string()))?;
    if !is_identifier(name) {
        return Err(PathError::NotFound);
    }
    let key = literal
        .trim()
        .parse()
        .map_err(|_| PathError::InvalidKey(literal.to_string()))?;
    Ok((name.to_string(), Some(key)))
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
