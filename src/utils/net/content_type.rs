//! Content-Type header parsing
//!
//! Parameters are kept in order and duplicates are preserved, so callers can
//! detect conflicting values instead of silently taking the last one.

/// Parsed `Content-Type` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lower-cased `type/subtype`
    pub media_type: String,
    /// `(lower-cased name, unquoted value)` pairs in header order
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Parse a header value such as `multipart/mixed; boundary="b 1"`
    pub fn parse(value: &str) -> Self {
        let mut segments = split_unquoted(value, ';').into_iter();
        let media_type = segments
            .next()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();

        let parameters = segments
            .filter_map(|segment| {
                let (name, value) = segment.split_once('=')?;
                Some((name.trim().to_lowercase(), unquote(value.trim())))
            })
            .collect();

        Self {
            media_type,
            parameters,
        }
    }

    /// Case-insensitive media type comparison
    pub fn is(&self, media_type: &str) -> bool {
        self.media_type.eq_ignore_ascii_case(media_type)
    }

    /// First value of a parameter
    pub fn parameter<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.parameters_named(name).next()
    }

    /// Every value given for a parameter, in header order
    pub fn parameters_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.parameters
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn split_unquoted(value: &str, separator: char) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (index, c) in value.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                segments.push(&value[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    segments.push(&value[start..]);
    segments
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\\\"", "\""),
        None => value.to_string(),
    }
}
