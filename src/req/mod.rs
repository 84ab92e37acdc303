#![warn(missing_docs)]

//! The request side of the pipeline: the [`Request`] struct and the
//! HTTP/1.1 parser that produces it from a raw byte buffer.

use crate::error::ParseError;
use crate::types::Method;
use bytes::Bytes;

/// Contains the case-insensitive request header map.
pub mod request_headers;

/// Contains the decoded query-string parameters.
pub mod query_params;

use query_params::QueryParams;
use request_headers::RequestHeaders;

/// Size of the first (and in the common case, only) read per connection.
pub const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Hard cap on the raw size of a single request.
pub const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Maximum number of header lines accepted per request.
pub const MAX_HEADER_COUNT: usize = 100;

/// Maximum size of a single header line in bytes.
pub const MAX_HEADER_LINE: usize = 8 * 1024;

/// A parsed HTTP/1.1 request. Immutable once parsed.
///
/// The path is the percent-decoded path component only; the query string
/// is decoded separately into [`QueryParams`]. The body is the raw byte
/// remainder of the buffer - the parser never interprets it.
///
/// ## Example
///
/// ```
/// use aqueduct::req::Request;
/// use aqueduct::types::Method;
///
/// let raw = b"GET /hello?name=ferris HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let req = Request::parse(raw).unwrap();
///
/// assert_eq!(req.method, Method::Get);
/// assert_eq!(req.path, "/hello");
/// assert_eq!(req.query.get("name"), Some("ferris"));
/// assert_eq!(req.header("HOST"), Some("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    /// The classified request method.
    pub method: Method,
    /// Percent-decoded path component, always beginning with `/`.
    pub path: String,
    /// The protocol version token, `HTTP/1.0` or `HTTP/1.1`.
    pub version: String,
    /// Case-insensitive header map, insertion order preserved.
    pub headers: RequestHeaders,
    /// Decoded query-string parameters.
    pub query: QueryParams,
    /// Raw body bytes. Not decoded, not length-checked against
    /// `Content-Length` - that header is advisory for consumers.
    pub body: Bytes,
}

impl Request {
    /// Parses one raw request buffer.
    ///
    /// The buffer is everything read from the client socket. On failure
    /// the whole parse fails - there are no partially-parsed requests -
    /// and the server answers `400 Bad Request`.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        if raw.len() > MAX_REQUEST_SIZE {
            return Err(ParseError::RequestTooLarge);
        }

        let line_end =
            memchr::memmem::find(raw, b"\r\n").ok_or(ParseError::MalformedRequestLine)?;
        let request_line =
            std::str::from_utf8(&raw[..line_end]).map_err(|_| ParseError::MalformedRequestLine)?;

        let mut tokens = request_line.split(' ');
        let (method_tok, uri_tok, version_tok) =
            match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
                (Some(m), Some(u), Some(v), None) if !m.is_empty() && !u.is_empty() => (m, u, v),
                _ => return Err(ParseError::MalformedRequestLine),
            };

        let method = Method::from_token(method_tok);
        if method == Method::Unknown {
            return Err(ParseError::UnsupportedMethod);
        }

        if version_tok != "HTTP/1.1" && version_tok != "HTTP/1.0" {
            return Err(ParseError::UnsupportedVersion);
        }

        let (raw_path, raw_query) = match uri_tok.split_once('?') {
            Some((p, q)) => (p, q),
            None => (uri_tok, ""),
        };

        let path = decode_path(raw_path)?;
        if !path.starts_with('/') {
            return Err(ParseError::MalformedRequestLine);
        }

        let query = if raw_query.is_empty() {
            QueryParams::new()
        } else {
            QueryParams::from_raw(raw_query)
        };

        let (headers, body_start) = parse_headers(raw, line_end + 2)?;

        let body = if body_start < raw.len() {
            Bytes::copy_from_slice(&raw[body_start..])
        } else {
            Bytes::new()
        };

        Ok(Request {
            method,
            path,
            version: version_tok.to_string(),
            headers,
            query,
            body,
        })
    }

    /// Looks a header up by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The advisory `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }
}

/// Percent-decodes the path component, rejecting malformed triples and
/// encoded NUL bytes.
fn decode_path(raw: &str) -> Result<String, ParseError> {
    // Validate every percent triple before handing the string to the
    // decoder, which passes malformed sequences through untouched.
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len()
                || !bytes[i + 1].is_ascii_hexdigit()
                || !bytes[i + 2].is_ascii_hexdigit()
            {
                return Err(ParseError::BadPercentEncoding);
            }
            if bytes[i + 1] == b'0' && bytes[i + 2] == b'0' {
                return Err(ParseError::BadPercentEncoding);
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let decoded = urlencoding::decode(raw).map_err(|_| ParseError::BadPercentEncoding)?;
    if decoded.contains('\0') {
        return Err(ParseError::BadPercentEncoding);
    }
    Ok(decoded.into_owned())
}

/// Reads header lines starting at `cursor` until the empty line. Returns
/// the map and the offset where the body begins.
fn parse_headers(raw: &[u8], mut cursor: usize) -> Result<(RequestHeaders, usize), ParseError> {
    let mut headers = RequestHeaders::new();
    let mut count = 0usize;

    loop {
        let line_end = match memchr::memmem::find(&raw[cursor..], b"\r\n") {
            Some(rel) => cursor + rel,
            None => {
                // Buffer ended without the blank line. Tolerate a final
                // unterminated header; there is no body in that case.
                if cursor < raw.len() {
                    store_header_line(&mut headers, &raw[cursor..], &mut count)?;
                }
                return Ok((headers, raw.len()));
            }
        };

        let line = &raw[cursor..line_end];
        if line.is_empty() {
            return Ok((headers, line_end + 2));
        }

        store_header_line(&mut headers, line, &mut count)?;
        cursor = line_end + 2;
    }
}

fn store_header_line(
    headers: &mut RequestHeaders,
    line: &[u8],
    count: &mut usize,
) -> Result<(), ParseError> {
    if line.len() > MAX_HEADER_LINE {
        return Err(ParseError::HeaderTooLarge);
    }
    *count += 1;
    if *count > MAX_HEADER_COUNT {
        return Err(ParseError::TooManyHeaders);
    }

    // Lines that are not UTF-8 or have no colon are skipped rather than
    // failing the request; proxies emit some strange things.
    if let Ok(text) = std::str::from_utf8(line) {
        if let Some((name, value)) = text.split_once(':') {
            if !name.is_empty() {
                headers.insert(name.trim(), value.trim().to_string());
            }
        }
    }
    Ok(())
}

/// How many bytes the request promises in total, derived from the head.
///
/// Returns `None` until the full head (terminated by a blank line) is in
/// the buffer. Once the head is complete, the result is head length plus
/// the advisory `Content-Length` (zero when absent). The accept path uses
/// this to widen the single 16 KiB read into a bounded read loop.
pub(crate) fn expected_total_len(buf: &[u8]) -> Option<usize> {
    let head_end = memchr::memmem::find(buf, b"\r\n\r\n")? + 4;
    let mut content_length = 0usize;
    for line in buf[..head_end].split(|&b| b == b'\n') {
        if let Ok(text) = std::str::from_utf8(line) {
            if let Some((name, value)) = text.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    if let Ok(n) = value.trim().parse::<usize>() {
                        content_length = n;
                    }
                }
            }
        }
    }
    Some(head_end + content_length)
}
