#![warn(missing_docs)]

//! The response side of the pipeline: the [`Response`] builder and its
//! wire serialization.

use serde::Serialize;
use tracing::{error, warn};

/// Contains the ordered response header collection.
pub mod response_headers;

/// Contains the status code enum and its conversions.
pub mod response_status;

use response_headers::ResponseHeaders;
use response_status::StatusCode;

/// An HTTP response under construction.
///
/// A `Response` is mutable through the build phase - handlers and
/// middleware set the status, headers, and body - and is serialized once
/// into its wire form when the worker writes it out. The builder methods
/// return `&mut Self` so calls chain.
///
/// ## Example
///
/// ```
/// use aqueduct::res::Response;
///
/// let mut res = Response::new();
/// res.status(201).text("created");
///
/// let wire = res.serialize();
/// let text = String::from_utf8(wire).unwrap();
/// assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
/// assert!(text.ends_with("\r\n\r\ncreated"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    // Overrides the derived reason phrase when set.
    reason: Option<String>,
    /// Response headers, serialized in insertion order.
    pub headers: ResponseHeaders,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Creates an empty `200 OK` response.
    pub fn new() -> Self {
        Response {
            status: StatusCode::Ok,
            reason: None,
            headers: ResponseHeaders::new(),
            body: Vec::new(),
        }
    }

    /// Sets the status code. Codes outside `[100, 599]` are ignored with
    /// a warning - a handler bug should not produce an unframeable
    /// status line.
    pub fn status(&mut self, code: u16) -> &mut Self {
        if (100..=599).contains(&code) {
            self.status = StatusCode::from_u16(code);
            self.reason = None;
        } else {
            warn!(code, "ignoring out-of-range status code");
        }
        self
    }

    /// The current status code.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Overrides the reason phrase derived from the status code.
    pub fn reason(&mut self, phrase: impl Into<String>) -> &mut Self {
        self.reason = Some(phrase.into());
        self
    }

    /// Sets a header, last-wins.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    /// Appends a header line, keeping existing lines with the same name.
    pub fn append_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.headers.append(name, value);
        self
    }

    /// Replaces the body with raw bytes. Leaves `Content-Type` alone.
    pub fn body(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.body = bytes.into();
        self
    }

    /// A read-only view of the current body.
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Sets a plain-text body and `Content-Type: text/plain`.
    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.headers.set("Content-Type", "text/plain");
        self.body = text.into().into_bytes();
        self
    }

    /// Sets an HTML body and `Content-Type: text/html`.
    pub fn html(&mut self, html: impl Into<String>) -> &mut Self {
        self.headers.set("Content-Type", "text/html");
        self.body = html.into().into_bytes();
        self
    }

    /// Serializes `value` as the JSON body and sets
    /// `Content-Type: application/json`.
    ///
    /// A value that fails to serialize turns the response into a 500 -
    /// the failure is logged, never panicked on.
    pub fn json<T: Serialize>(&mut self, value: T) -> &mut Self {
        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                self.headers.set("Content-Type", "application/json");
                self.body = bytes;
            }
            Err(err) => {
                error!(%err, "failed to serialize JSON response body");
                self.status = StatusCode::InternalServerError;
                self.reason = None;
                self.headers.set("Content-Type", "text/plain");
                self.body = b"Internal Server Error".to_vec();
            }
        }
        self
    }

    /// Issues a redirect to `url` with the given status code (302 for a
    /// temporary redirect, 301 permanent).
    pub fn redirect(&mut self, url: impl Into<String>, code: u16) -> &mut Self {
        self.status(code);
        self.headers.set("Location", url);
        self
    }

    /// Assembles the wire form.
    ///
    /// `Content-Length` is added if the builder did not set one, and
    /// `Connection: close` is always present - the server does not honor
    /// keep-alive. The head ends with the canonical blank line before the
    /// body.
    pub fn serialize(&self) -> Vec<u8> {
        let reason = match &self.reason {
            Some(phrase) => phrase.as_str(),
            None => self.status.reason(),
        };

        let mut wire = Vec::with_capacity(128 + self.body.len());
        wire.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), reason).as_bytes(),
        );
        for (name, value) in self.headers.iter() {
            wire.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        if !self.headers.contains("content-length") {
            wire.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        if !self.headers.contains("connection") {
            wire.extend_from_slice(b"Connection: close\r\n");
        }
        wire.extend_from_slice(b"\r\n");
        wire.extend_from_slice(&self.body);
        wire
    }
}
