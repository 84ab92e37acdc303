#![warn(missing_docs)]

//! # Aqueduct
//!
//! Aqueduct is a modular, thread-per-connection HTTP/1.1 application
//! server. Connections are accepted on a bounded worker pool, parsed,
//! routed through an ordered middleware chain into a parameterized route
//! table, and answered through a fluent per-request context. Plugins
//! extend the server at startup with routes, middleware, and lifecycle
//! hooks; handlers that need to keep the socket - MJPEG-style frame
//! push, for example - return a stream continuation instead of a
//! buffered response.
//!
//! ## Modules
//!
//! - [`server`] - The orchestrator: accept loop, worker hand-off, graceful stop.
//! - [`config`] - The `KEY=VALUE` configuration store.
//! - [`req`] - Request parsing: method, path, query, headers, body.
//! - [`res`] - Response building and wire serialization.
//! - [`context`] - The per-request bundle handed to middleware and handlers.
//! - [`router`] - Template compilation, matching, parameter extraction, groups.
//! - [`middleware`] - The ordered chain with its consuming `next` continuation.
//! - [`plugin`] - The plugin trait, descriptor, and registry.
//! - [`plugins`] - Built-in plugins: static files, uploads, token auth.
//! - [`multipart`] - The binary-safe `multipart/form-data` parser.
//! - [`resolve`] - Canonical-root path containment for static serving.
//! - [`stream`] - The long-lived multipart push channel.
//! - [`transport`] - The blocking TCP listener and connection handles.
//! - [`workers`] - The bounded worker pool.
//!
//! ## A minimal server
//!
//! ```no_run
//! use aqueduct::config::Config;
//! use aqueduct::server::Server;
//! use aqueduct::types::ResponseKind;
//!
//! let mut server = Server::new(Config::new());
//! server
//!     .router()
//!     .get("/users/:id", |ctx| {
//!         let id = ctx.param("id").unwrap_or("").to_string();
//!         ctx.json(serde_json::json!({ "id": id }));
//!         ResponseKind::Buffered
//!     })
//!     .unwrap();
//!
//! server.start().unwrap();
//! ```

/// The `KEY=VALUE` configuration store.
pub mod config;

/// The per-request context handed to middleware and handlers.
pub mod context;

/// Error types for every concern in the crate.
pub mod error;

/// The ordered middleware chain and its `Next` continuation.
pub mod middleware;

/// The binary-safe `multipart/form-data` parser.
pub mod multipart;

/// The plugin trait, descriptor, and registry.
pub mod plugin;

/// Built-in plugins: static files, uploads, token auth.
pub mod plugins;

/// Request parsing and the request data model.
pub mod req;

/// Response building and wire serialization.
pub mod res;

/// Canonical-root path containment for static file serving.
pub mod resolve;

/// The router: templates, matching, parameter extraction, groups.
pub mod router;

/// The server orchestrator and its shutdown plumbing.
pub mod server;

/// The streaming channel for long-lived multipart responses.
pub mod stream;

/// The blocking TCP transport.
pub mod transport;

/// Core shared types: `Method`, `Handler`, `ResponseKind`.
pub mod types;

/// The bounded worker pool.
pub mod workers;

mod tests;

pub use config::Config;
pub use context::Context;
pub use plugin::{Plugin, PluginDescriptor};
pub use server::{Server, ServerHandle};
pub use types::{Method, ResponseKind};
