#![warn(missing_docs)]

//! Built-in plugins.
//!
//! These are ordinary [`Plugin`](crate::plugin::Plugin) implementations
//! shipped with the server: static file serving, multipart uploads, and
//! bearer-token authentication. They double as the reference examples
//! for writing your own.

/// Bearer-token authentication middleware plugin.
pub mod auth;

/// Static file serving through the path-safety resolver.
pub mod static_files;

/// Multipart upload handling.
pub mod uploads;
