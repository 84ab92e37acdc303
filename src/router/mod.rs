#![warn(missing_docs)]

//! The router: template compilation, ordered matching, parameter
//! extraction, and prefix groups.
//!
//! Templates are plain path literals with two extensions:
//!
//! - a segment beginning with `:` names a capturing parameter matching
//!   one segment (`[^/]+`);
//! - a trailing `*` segment captures the remaining path, slashes
//!   included, under the parameter name `*` (this is how the
//!   static-files plugin mounts).
//!
//! Every other character is escaped, so a literal `.` or `+` in a
//! template matches itself. Matching walks the route list in insertion
//! order and the first hit wins; later registrations never shadow
//! earlier ones.

use crate::context::Context;
use crate::error::RouteError;
use crate::types::{Handler, Method, ResponseKind};
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

const NOT_FOUND_BODY: &str = "<html><body><h1>404 Not Found</h1></body></html>";
const METHOD_NOT_ALLOWED_BODY: &str =
    "<html><body><h1>405 Method Not Allowed</h1></body></html>";

/// One registered route: the compiled pattern, the parameter names in
/// template order, and the handler to invoke on a match.
pub struct Route {
    /// The method this route answers.
    pub method: Method,
    /// The template as registered (after group prefixes were applied).
    pub template: String,
    /// Parameter names in left-to-right template order.
    pub param_names: Vec<String>,
    pattern: Regex,
    handler: Handler,
}

/// An ordered route table.
///
/// ## Example
///
/// ```
/// use aqueduct::router::Router;
/// use aqueduct::types::{Method, ResponseKind};
///
/// let mut router = Router::new();
/// router
///     .get("/users/:id", |ctx| {
///         let id = ctx.param("id").unwrap_or("").to_string();
///         ctx.text(id);
///         ResponseKind::Buffered
///     })
///     .unwrap();
///
/// assert!(router.matches(Method::Get, "/users/42"));
/// assert!(!router.matches(Method::Post, "/users/42"));
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `template` and appends a route. Compilation failures
    /// surface here, synchronously - a bad template can never take the
    /// accept loop down later.
    pub fn register<F>(&mut self, method: Method, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        let template = normalize_template(template);
        let (pattern, param_names) = compile(&template)?;

        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.template == template)
        {
            debug!(%method, template, "route is shadowed by an earlier identical registration");
        }

        self.routes.push(Route {
            method,
            template,
            param_names,
            pattern,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Registers a GET route.
    pub fn get<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Get, template, handler)
    }

    /// Registers a POST route.
    pub fn post<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Post, template, handler)
    }

    /// Registers a PUT route.
    pub fn put<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Put, template, handler)
    }

    /// Registers a DELETE route.
    pub fn delete<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Delete, template, handler)
    }

    /// Registers a PATCH route.
    pub fn patch<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Patch, template, handler)
    }

    /// Registers an OPTIONS route.
    pub fn options<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Options, template, handler)
    }

    /// Registers a HEAD route.
    pub fn head<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Head, template, handler)
    }

    /// Returns a scope that prepends `prefix` to everything registered
    /// through it. Scopes nest; nested prefixes concatenate.
    ///
    /// ```
    /// use aqueduct::router::Router;
    /// use aqueduct::types::{Method, ResponseKind};
    ///
    /// let mut router = Router::new();
    /// let mut api = router.group("/api");
    /// let mut v1 = api.group("/v1");
    /// v1.get("/health", |ctx| { ctx.text("ok"); ResponseKind::Buffered }).unwrap();
    ///
    /// assert!(router.matches(Method::Get, "/api/v1/health"));
    /// ```
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_> {
        RouteGroup {
            router: self,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Whether some route would answer `(method, path)`.
    pub fn matches(&self, method: Method, path: &str) -> bool {
        self.find(method, path).is_some()
    }

    /// Finds the first route answering `(method, path)` and returns its
    /// extracted parameters in template order.
    pub fn find(&self, method: Method, path: &str) -> Option<(&Route, Vec<(String, String)>)> {
        for route in &self.routes {
            if route.method != method {
                continue;
            }
            if let Some(caps) = route.pattern.captures(path) {
                let params = route
                    .param_names
                    .iter()
                    .zip(caps.iter().skip(1))
                    .map(|(name, cap)| {
                        let value = cap.map(|m| m.as_str().to_string()).unwrap_or_default();
                        (name.clone(), value)
                    })
                    .collect();
                return Some((route, params));
            }
        }
        None
    }

    /// Routes the request in `ctx`: on a match, installs the extracted
    /// parameters and invokes the handler exactly once. On a miss, writes
    /// the `404` page - or a `405` when some route matched the path under
    /// a different method.
    pub fn dispatch(&self, ctx: &mut Context) -> ResponseKind {
        let method = ctx.method();

        let found = self.find(method, ctx.path()).map(|(route, params)| {
            // Clone the Arc so the borrow of the table ends before the
            // handler takes the context mutably.
            (route.handler.clone(), params)
        });

        if let Some((handler, params)) = found {
            ctx.set_params(params);
            return (handler.as_ref())(ctx);
        }

        let path_known = self
            .routes
            .iter()
            .any(|r| r.method != method && r.pattern.is_match(ctx.path()));

        if path_known {
            ctx.status(405).html(METHOD_NOT_ALLOWED_BODY);
        } else {
            ctx.status(404).html(NOT_FOUND_BODY);
        }
        ResponseKind::Buffered
    }
}

/// A registration scope created by [`Router::group`].
pub struct RouteGroup<'a> {
    router: &'a mut Router,
    prefix: String,
}

impl RouteGroup<'_> {
    /// Registers a route under this scope's prefix.
    pub fn register<F>(&mut self, method: Method, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        let template = normalize_template(template);
        let full = format!("{}{}", self.prefix, template);
        self.router.register(method, &full, handler)
    }

    /// Registers a GET route under the prefix.
    pub fn get<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Get, template, handler)
    }

    /// Registers a POST route under the prefix.
    pub fn post<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Post, template, handler)
    }

    /// Registers a PUT route under the prefix.
    pub fn put<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Put, template, handler)
    }

    /// Registers a DELETE route under the prefix.
    pub fn delete<F>(&mut self, template: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> ResponseKind + Send + Sync + 'static,
    {
        self.register(Method::Delete, template, handler)
    }

    /// A nested scope; prefixes concatenate.
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_> {
        RouteGroup {
            router: self.router,
            prefix: format!("{}{}", self.prefix, prefix.trim_end_matches('/')),
        }
    }
}

fn normalize_template(template: &str) -> String {
    if template.starts_with('/') {
        template.to_string()
    } else {
        format!("/{}", template)
    }
}

/// Compiles a template into an anchored regex plus its parameter names.
fn compile(template: &str) -> Result<(Regex, Vec<String>), RouteError> {
    let segments: Vec<&str> = template.split('/').collect();
    let last = segments.len() - 1;

    let mut params = Vec::new();
    let mut pieces = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        if *segment == "*" && i == last {
            params.push("*".to_string());
            pieces.push("(.*)".to_string());
        } else if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(RouteError {
                    template: template.to_string(),
                    reason: "parameter segment has no name".to_string(),
                });
            }
            params.push(name.to_string());
            pieces.push("([^/]+)".to_string());
        } else {
            pieces.push(regex::escape(segment));
        }
    }

    let pattern = format!("^{}$", pieces.join("/"));
    let regex = Regex::new(&pattern).map_err(|err| RouteError {
        template: template.to_string(),
        reason: err.to_string(),
    })?;

    Ok((regex, params))
}
