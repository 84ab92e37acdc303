#![warn(missing_docs)]

//! The middleware pipeline: an ordered chain invoked ahead of the router,
//! each entry handed a [`Next`] continuation.
//!
//! A middleware runs exactly once per request. Calling `next.run(ctx)`
//! descends one step - into the following middleware, or into the router
//! after the last one. Not calling it **short-circuits**: the rest of the
//! chain and the router are skipped and the middleware's response is what
//! the client gets. Code after the `next.run` call executes once the
//! entire downstream has completed, which is where timing, logging, and
//! header-injection middleware do their work.
//!
//! `Next::run` consumes the continuation, so "calling `next` twice" is
//! not a runtime error to detect - it does not compile.

use crate::context::Context;
use crate::router::Router;
use crate::types::ResponseKind;
use std::sync::Arc;

/// The middleware signature: the per-request context plus the
/// continuation to the rest of the pipeline.
pub type MiddlewareFn = Arc<dyn Fn(&mut Context, Next<'_>) -> ResponseKind + Send + Sync>;

/// The ordered middleware chain. Registration order is execution order.
///
/// ## Example
///
/// ```
/// use aqueduct::middleware::MiddlewareChain;
/// use aqueduct::types::ResponseKind;
///
/// let mut chain = MiddlewareChain::new();
/// chain.add(|ctx, next| {
///     ctx.set_header("X-Request-Id", "42");
///     let kind = next.run(ctx);
///     // Runs after every downstream middleware and the router.
///     kind
/// });
/// ```
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    entries: Vec<MiddlewareFn>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware. Later additions run later (and their
    /// post-`next` code runs earlier).
    pub fn add<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context, Next<'_>) -> ResponseKind + Send + Sync + 'static,
    {
        self.entries.push(Arc::new(middleware));
        self
    }

    /// Number of registered middleware.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the whole pipeline for one request: the chain in order, then
    /// the router (which writes the 404 page on a miss).
    pub fn run(&self, ctx: &mut Context, router: &Router) -> ResponseKind {
        Next {
            chain: &self.entries,
            router,
        }
        .run(ctx)
    }
}

/// The continuation a middleware receives.
///
/// Consuming `self` makes the at-most-once contract structural: a
/// middleware can descend, or return early, but cannot descend twice.
pub struct Next<'a> {
    chain: &'a [MiddlewareFn],
    router: &'a Router,
}

impl Next<'_> {
    /// Advances one step: the following middleware if any remain,
    /// otherwise the router.
    pub fn run(self, ctx: &mut Context) -> ResponseKind {
        match self.chain.split_first() {
            Some((middleware, rest)) => {
                let next = Next {
                    chain: rest,
                    router: self.router,
                };
                (middleware.as_ref())(ctx, next)
            }
            None => self.router.dispatch(ctx),
        }
    }
}
