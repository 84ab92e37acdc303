#![warn(missing_docs)]

//! The per-request [`Context`] handed to middleware and handlers.

use crate::req::Request;
use crate::res::Response;
use crate::types::Method;
use ahash::AHashMap;
use serde::Serialize;
use std::any::Any;

/// Everything one request needs in one place: the parsed [`Request`], the
/// [`Response`] under construction, the path parameters the router
/// extracted, and a typed scratch map middleware uses to pass values
/// downstream (an authenticated user, a request id, a timing mark).
///
/// A `Context` lives for exactly one worker task and is never shared
/// across threads.
///
/// ## Example
///
/// ```
/// use aqueduct::context::Context;
/// use aqueduct::req::Request;
///
/// let req = Request::parse(b"GET /users/42?full=1 HTTP/1.1\r\n\r\n").unwrap();
/// let mut ctx = Context::new(req);
///
/// ctx.status(200).json(serde_json::json!({ "ok": true }));
/// assert_eq!(ctx.query("full"), Some("1"));
/// ```
pub struct Context {
    request: Request,
    response: Response,
    params: AHashMap<String, String>,
    state: AHashMap<String, Box<dyn Any + Send>>,
}

impl Context {
    /// Wraps a parsed request with a fresh `200 OK` response.
    pub fn new(request: Request) -> Self {
        Context {
            request,
            response: Response::new(),
            params: AHashMap::new(),
            state: AHashMap::new(),
        }
    }

    /// The parsed request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.request.method
    }

    /// The percent-decoded request path.
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// A path parameter extracted by the router, by template name. The
    /// catch-all segment is reachable under the name `*`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A decoded query-string parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.request.query.get(name)
    }

    /// A request header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers.get(name)
    }

    /// Installs the parameters the router extracted for the matched
    /// route. Called once per request, before the handler runs.
    pub(crate) fn set_params(&mut self, params: Vec<(String, String)>) {
        self.params = params.into_iter().collect();
    }

    // ── response building ──

    /// The response under construction.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Mutable access to the response for anything the chainable surface
    /// does not cover.
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Sets the response status code. Chainable.
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.response.status(code);
        self
    }

    /// Sets a response header, last-wins. Chainable.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.response.set_header(name, value);
        self
    }

    /// Appends a response header line. Chainable.
    pub fn append_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.response.append_header(name, value);
        self
    }

    /// Sets the raw response body. Chainable.
    pub fn body(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.response.body(bytes);
        self
    }

    /// Plain-text body plus `Content-Type: text/plain`. Chainable.
    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.response.text(text);
        self
    }

    /// HTML body plus `Content-Type: text/html`. Chainable.
    pub fn html(&mut self, html: impl Into<String>) -> &mut Self {
        self.response.html(html);
        self
    }

    /// JSON body plus `Content-Type: application/json`. Chainable.
    pub fn json<T: Serialize>(&mut self, value: T) -> &mut Self {
        self.response.json(value);
        self
    }

    /// Temporary redirect (302) to `url`. Chainable.
    pub fn redirect(&mut self, url: impl Into<String>) -> &mut Self {
        self.response.redirect(url, 302);
        self
    }

    /// Redirect with an explicit status code (301, 302, …). Chainable.
    pub fn redirect_with(&mut self, url: impl Into<String>, code: u16) -> &mut Self {
        self.response.redirect(url, code);
        self
    }

    // ── typed scratch ──

    /// Stores a value for downstream middleware and the handler.
    pub fn set(&mut self, key: impl Into<String>, value: impl Any + Send) {
        self.state.insert(key.into(), Box::new(value));
    }

    /// Fetches a previously stored value. Returns `None` when the key is
    /// absent or holds a different type - never fails hard.
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.state.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Tears the context down into its response for serialization.
    pub(crate) fn into_response(self) -> Response {
        self.response
    }
}
