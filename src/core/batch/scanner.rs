//! MIME boundary scanner
//!
//! Splits a multipart body into raw parts for one boundary token. The scanner
//! is a lazy iterator over the input slice; it never copies body bytes.

use super::error::BatchError;
use super::types::Headers;

/// One raw multipart segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPart<'a> {
    pub headers: Headers,
    pub body: &'a [u8],
}

/// A delimiter line found at the start of a line
#[derive(Debug, Clone, Copy)]
struct Delimiter {
    line_start: usize,
    next_line: usize,
    is_terminator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Preamble,
    Parts,
    Done,
}

/// Lazy iterator over the parts of a multipart body
#[derive(Debug)]
pub struct PartScanner<'a> {
    data: &'a [u8],
    delimiter: Vec<u8>,
    cursor: usize,
    state: ScanState,
}

impl<'a> PartScanner<'a> {
    pub fn new(data: &'a [u8], boundary: &str) -> Result<Self, BatchError> {
        if boundary.is_empty() {
            return Err(BatchError::malformed("boundary token is empty"));
        }

        let mut delimiter = Vec::with_capacity(boundary.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary.as_bytes());

        Ok(Self {
            data,
            delimiter,
            cursor: 0,
            state: ScanState::Preamble,
        })
    }

    /// Collect every part, failing on the first malformed one
    pub fn collect_parts(self) -> Result<Vec<RawPart<'a>>, BatchError> {
        self.collect()
    }

    fn open(&mut self) -> Result<bool, BatchError> {
        let opening = self
            .find_delimiter(0)
            .ok_or_else(|| BatchError::malformed("no opening boundary line found"))?;
        self.cursor = opening.next_line;
        Ok(!opening.is_terminator)
    }

    fn next_part(&mut self) -> Result<(RawPart<'a>, bool), BatchError> {
        let (headers, body_start) = parse_header_block(self.data, self.cursor)?;

        let (body_end, delimiter) = match headers.get("Content-Length") {
            Some(length) => self.sized_body(body_start, length)?,
            None => {
                let delimiter = self.find_delimiter(body_start).ok_or_else(|| {
                    BatchError::malformed("missing closing boundary line (no terminator found)")
                })?;
                let body_end = strip_line_break(self.data, delimiter.line_start).max(body_start);
                (body_end, delimiter)
            }
        };

        self.cursor = delimiter.next_line;
        let part = RawPart {
            headers,
            body: &self.data[body_start..body_end],
        };
        Ok((part, !delimiter.is_terminator))
    }

    fn sized_body(&self, body_start: usize, length: &str) -> Result<(usize, Delimiter), BatchError> {
        let length: usize = length
            .trim()
            .parse()
            .map_err(|_| BatchError::malformed(format!("invalid part Content-Length '{}'", length)))?;

        let body_end = body_start
            .checked_add(length)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| BatchError::malformed("part body is shorter than its Content-Length"))?;

        let mut after = body_end;
        if self.data[after..].starts_with(b"\r\n") {
            after += 2;
        } else if self.data[after..].starts_with(b"\n") {
            after += 1;
        }

        let delimiter = self.delimiter_at(after).ok_or_else(|| {
            BatchError::malformed("part Content-Length does not end at a boundary line")
        })?;
        Ok((body_end, delimiter))
    }

    /// Find the first delimiter line starting at or after `from` (a line start)
    fn find_delimiter(&self, from: usize) -> Option<Delimiter> {
        let mut line_start = from;
        while line_start <= self.data.len() {
            if let Some(delimiter) = self.delimiter_at(line_start) {
                return Some(delimiter);
            }
            let newline = self.data[line_start..].iter().position(|b| *b == b'\n')?;
            line_start += newline + 1;
        }
        None
    }

    /// Check whether the line beginning at `line_start` is a delimiter line
    fn delimiter_at(&self, line_start: usize) -> Option<Delimiter> {
        let rest = self.data.get(line_start..)?;
        if !rest.starts_with(&self.delimiter) {
            return None;
        }

        let mut pos = line_start + self.delimiter.len();
        let is_terminator = self.data[pos..].starts_with(b"--");
        if is_terminator {
            pos += 2;
        }

        while pos < self.data.len() && matches!(self.data[pos], b' ' | b'\t') {
            pos += 1;
        }

        let next_line = if pos == self.data.len() {
            pos
        } else if self.data[pos..].starts_with(b"\r\n") {
            pos + 2
        } else if self.data[pos] == b'\n' {
            pos + 1
        } else {
            // "--boundaryX" is a different token
            return None;
        };

        Some(Delimiter {
            line_start,
            next_line,
            is_terminator,
        })
    }
}

impl<'a> Iterator for PartScanner<'a> {
    type Item = Result<RawPart<'a>, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ScanState::Preamble {
            match self.open() {
                Ok(true) => self.state = ScanState::Parts,
                Ok(false) => self.state = ScanState::Done,
                Err(e) => {
                    self.state = ScanState::Done;
                    return Some(Err(e));
                }
            }
        }

        if self.state == ScanState::Done {
            return None;
        }

        match self.next_part() {
            Ok((part, more)) => {
                if !more {
                    self.state = ScanState::Done;
                }
                Some(Ok(part))
            }
            Err(e) => {
                self.state = ScanState::Done;
                Some(Err(e))
            }
        }
    }
}

/// Parse `Name: value` lines from `start` up to the first blank line
///
/// Returns the headers and the offset of the first byte after the blank line.
/// Folded continuation lines (leading space or tab) extend the previous value.
pub(crate) fn parse_header_block(data: &[u8], start: usize) -> Result<(Headers, usize), BatchError> {
    let mut headers = Headers::new();
    let mut line_start = start;

    loop {
        let (line, next_line) = read_line(data, line_start)
            .ok_or_else(|| BatchError::malformed("header block is not terminated by a blank line"))?;

        if line.is_empty() {
            return Ok((headers, next_line));
        }

        let line = std::str::from_utf8(line)
            .map_err(|_| BatchError::malformed("header line is not valid UTF-8"))?;

        if line.starts_with([' ', '\t']) {
            if !headers.extend_last(line.trim()) {
                return Err(BatchError::malformed(format!(
                    "continuation line without a header: '{}'",
                    line
                )));
            }
        } else {
            let (name, value) = split_header_line(line)?;
            headers.insert(name, value);
        }

        line_start = next_line;
    }
}

fn split_header_line(line: &str) -> Result<(&str, &str), BatchError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| BatchError::malformed(format!("malformed header line: '{}'", line)))?;

    let name = name.trim_end();
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return Err(BatchError::malformed(format!(
            "malformed header name in line: '{}'",
            line
        )));
    }

    Ok((name, value.trim()))
}

/// RFC 7230 `tchar`
pub(crate) fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Read one line starting at `start`, without its line break
///
/// Returns `None` only when `start` is past the end of the input. A final line
/// without a line break is returned as-is.
pub(crate) fn read_line(data: &[u8], start: usize) -> Option<(&[u8], usize)> {
    if start >= data.len() {
        return None;
    }

    match data[start..].iter().position(|b| *b == b'\n') {
        Some(offset) => {
            let end = start + offset;
            let line = &data[start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            Some((line, end + 1))
        }
        None => Some((&data[start..], data.len())),
    }
}

/// Offset of the line break that ends right before `line_start`
fn strip_line_break(data: &[u8], line_start: usize) -> usize {
    if line_start >= 2 && &data[line_start - 2..line_start] == b"\r\n" {
        line_start - 2
    } else if line_start >= 1 && data[line_start - 1] == b'\n' {
        line_start - 1
    } else {
        line_start
    }
}
