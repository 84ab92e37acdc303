#![warn(missing_docs)]

//! A binary-safe `multipart/form-data` parser.
//!
//! The parser scans for the boundary as a byte literal - the boundary is
//! chosen by the client to be unique in the body and is never decoded -
//! and splits the body into ordered [`MultipartPart`]s. Part data is
//! carried as raw bytes and never interpreted as text, so uploads with
//! arbitrary binary content round-trip unchanged.

use crate::error::MultipartError;
use crate::req::request_headers::RequestHeaders;
use bytes::Bytes;
use memchr::memmem;

/// One decoded part of a multipart body.
///
/// A part is a **file part** iff [`filename`](MultipartPart::filename) is
/// non-empty; otherwise it is a plain form field whose value is
/// [`data`](MultipartPart::data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    /// The part's own headers, case-insensitive.
    pub headers: RequestHeaders,
    /// The `name` parameter of `Content-Disposition`. May be empty when
    /// the client omitted it.
    pub name: String,
    /// The `filename` parameter of `Content-Disposition`; empty for
    /// non-file fields.
    pub filename: String,
    /// The part's `Content-Type`, verbatim. Empty when absent, which
    /// semantically means `text/plain`.
    pub content_type: String,
    /// The raw part data, trailing CRLF before the next boundary already
    /// stripped.
    pub data: Bytes,
}

impl MultipartPart {
    /// Whether this part carries an uploaded file.
    pub fn is_file(&self) -> bool {
        !self.filename.is_empty()
    }
}

/// Pulls the `boundary` parameter out of a `Content-Type` header value.
///
/// Prefers strict parsing through the `mime` crate (which handles quoting
/// and spacing), then falls back to a best-effort manual scan for
/// non-standard content types.
///
/// ## Example
///
/// ```
/// use aqueduct::multipart::boundary_from_content_type;
///
/// let ct = "multipart/form-data; boundary=----X";
/// assert_eq!(boundary_from_content_type(ct).as_deref(), Some("----X"));
/// assert_eq!(boundary_from_content_type("text/plain"), None);
/// ```
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    if let Ok(m) = content_type.parse::<mime::Mime>() {
        if m.type_() == mime::MULTIPART {
            if let Some(b) = m.get_param("boundary") {
                let s = b.as_str();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }

    for piece in content_type.split(';').map(str::trim) {
        if let Some((key, value)) = piece.split_once('=') {
            if key.trim().eq_ignore_ascii_case("boundary") {
                let b = value.trim().trim_matches('"');
                if !b.is_empty() {
                    return Some(b.to_string());
                }
            }
        }
    }

    None
}

/// Parses a multipart body against the given boundary token.
///
/// Returns the parts in the order they appear. The terminating marker
/// `--<boundary>--` ends parsing regardless of any epilogue bytes that
/// follow it. An empty part list is not an error here; callers decide
/// whether an upload without parts is a `400`.
///
/// ## Example
///
/// ```
/// use aqueduct::multipart::parse;
///
/// let body = b"--B\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--B--";
/// let parts = parse(body, "B").unwrap();
/// assert_eq!(parts.len(), 1);
/// assert_eq!(parts[0].name, "note");
/// assert_eq!(&parts[0].data[..], b"hi");
/// ```
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<MultipartPart>, MultipartError> {
    let delim = format!("--{}", boundary);
    let delim_bytes = delim.as_bytes();
    let next_marker = format!("\r\n--{}", boundary);
    let next_finder = memmem::Finder::new(next_marker.as_bytes());

    // The opening delimiter may be preceded by a prologue.
    let mut pos = memmem::find(body, delim_bytes).ok_or(MultipartError::MissingBoundary)?
        + delim_bytes.len();

    let mut parts = Vec::new();

    loop {
        // `--` directly after a delimiter is the terminating marker.
        if body.get(pos..pos + 2) == Some(b"--") {
            return Ok(parts);
        }
        if body.get(pos..pos + 2) == Some(b"\r\n") {
            pos += 2;
        }
        if pos >= body.len() {
            return Ok(parts);
        }

        let header_end = memmem::find(&body[pos..], b"\r\n\r\n")
            .map(|rel| pos + rel)
            .ok_or(MultipartError::MalformedPart)?;
        let headers = parse_part_headers(&body[pos..header_end]);
        let data_start = header_end + 4;

        // Data runs to the CRLF that precedes the next boundary marker;
        // that CRLF belongs to the framing, not the data.
        let marker_at = next_finder
            .find(&body[data_start..])
            .map(|rel| data_start + rel)
            .ok_or(MultipartError::MalformedPart)?;
        let data = Bytes::copy_from_slice(&body[data_start..marker_at]);

        let (name, filename) = disposition_params(&headers);
        let content_type = headers.get("content-type").unwrap_or("").to_string();

        parts.push(MultipartPart {
            headers,
            name,
            filename,
            content_type,
            data,
        });

        pos = marker_at + 2 + delim_bytes.len();
    }
}

/// Decodes the ASCII header block of one part.
fn parse_part_headers(block: &[u8]) -> RequestHeaders {
    let mut headers = RequestHeaders::new();
    for line in block.split(|&b| b == b'\n') {
        let line = match line.strip_suffix(b"\r") {
            Some(stripped) => stripped,
            None => line,
        };
        if let Ok(text) = std::str::from_utf8(line) {
            if let Some((name, value)) = text.split_once(':') {
                if !name.trim().is_empty() {
                    headers.insert(name.trim(), value.trim().to_string());
                }
            }
        }
    }
    headers
}

/// Extracts `name` and `filename` from a `Content-Disposition` value.
/// `form-data` is the implied disposition; quotes around parameter
/// values are removed.
fn disposition_params(headers: &RequestHeaders) -> (String, String) {
    let mut name = String::new();
    let mut filename = String::new();

    if let Some(disposition) = headers.get("content-disposition") {
        for param in disposition.split(';').map(str::trim) {
            if let Some((key, value)) = param.split_once('=') {
                let value = value.trim().trim_matches('"');
                match key.trim().to_ascii_lowercase().as_str() {
                    "name" => name = value.to_string(),
                    "filename" => filename = value.to_string(),
                    _ => {}
                }
            }
        }
    }

    (name, filename)
}
