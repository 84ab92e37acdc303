#![warn(missing_docs)]

//! Core types shared across the request pipeline: the HTTP [`Method`]
//! enum, the [`Handler`] signature, and the [`ResponseKind`] a handler
//! returns to tell the worker how the response leaves the process.

use crate::context::Context;
use crate::server::ShutdownSignal;
use crate::transport::Connection;
use std::fmt::Display;
use std::sync::Arc;

/// The HTTP methods the server recognizes.
///
/// Parsing is case-sensitive against the canonical ASCII tokens, so
/// `get` or `Get` classify as [`Method::Unknown`] and the request is
/// rejected before routing.
///
/// ## Example
///
/// ```
/// use aqueduct::types::Method;
///
/// assert_eq!(Method::from_token("GET"), Method::Get);
/// assert_eq!(Method::from_token("get"), Method::Unknown);
/// assert_eq!(Method::Post.as_str(), "POST");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// The GET method.
    Get,
    /// The POST method.
    Post,
    /// The PUT method.
    Put,
    /// The DELETE method.
    Delete,
    /// The PATCH method.
    Patch,
    /// The OPTIONS method.
    Options,
    /// The HEAD method.
    Head,
    /// Anything else. Requests with an unknown method are rejected.
    Unknown,
}

impl Method {
    /// Classifies a request-line token. Case-sensitive.
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "PATCH" => Method::Patch,
            "OPTIONS" => Method::Options,
            "HEAD" => Method::Head,
            _ => Method::Unknown,
        }
    }

    /// The canonical ASCII token for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
            Method::Unknown => "UNKNOWN",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A long-lived response continuation.
///
/// The worker hands the continuation the client [`Connection`] (full
/// ownership) and the server's shutdown signal. The continuation writes
/// directly to the socket for as long as it pleases; it must observe the
/// signal on every cycle so that [`Server::stop`](crate::server::Server::stop)
/// is never stalled behind a sleeping stream.
pub type StreamFn = Box<dyn FnOnce(Connection, &ShutdownSignal) -> std::io::Result<()> + Send>;

/// What a handler (or a short-circuiting middleware) produced.
///
/// The default is [`ResponseKind::Buffered`]: the worker serializes the
/// context's response and writes it in one piece. A handler that wants to
/// keep the socket - an MJPEG push stream, for example - returns
/// [`ResponseKind::Stream`] instead, and the worker hands the connection
/// over rather than serializing anything.
pub enum ResponseKind {
    /// Serialize the context's response and send it. The common case.
    Buffered,
    /// The handler keeps the socket; the worker runs the continuation
    /// and skips buffered serialization entirely.
    Stream(StreamFn),
}

impl std::fmt::Debug for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseKind::Buffered => f.write_str("Buffered"),
            ResponseKind::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A route handler: receives the per-request [`Context`] and mutates its
/// response (or takes the socket over by returning a stream continuation).
pub type Handler = Arc<dyn Fn(&mut Context) -> ResponseKind + Send + Sync>;
