#![warn(missing_docs)]

//! Error types used across the server.
//!
//! Each concern gets its own enum so that callers can match on exactly the
//! failures they are able to handle: [`ParseError`] for request parsing,
//! [`MultipartError`] for body decoding, [`RouteError`] for template
//! compilation, [`PluginError`] for registry lifecycle failures,
//! [`ConfigError`] for configuration loading, and [`ServerError`] as the
//! umbrella surfaced by [`Server::start`](crate::server::Server::start).

use thiserror::Error;

/// Failures produced while parsing a raw HTTP/1.1 request.
///
/// Every variant fails the whole parse; the server answers with
/// `400 Bad Request` carrying the terse `Display` form of the variant as a
/// plain-text body and closes the connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The request line did not split into exactly `METHOD SP URI SP VERSION`.
    #[error("malformed request line")]
    MalformedRequestLine,

    /// The method token is not one of the recognized HTTP methods.
    #[error("unsupported method")]
    UnsupportedMethod,

    /// The version token is neither `HTTP/1.0` nor `HTTP/1.1`.
    #[error("unsupported protocol version")]
    UnsupportedVersion,

    /// A single header line exceeded the per-line size limit.
    #[error("header line too large")]
    HeaderTooLarge,

    /// The request carried more header lines than the server accepts.
    #[error("too many headers")]
    TooManyHeaders,

    /// The path contained a malformed percent triple or an encoded NUL.
    #[error("bad percent-encoding in path")]
    BadPercentEncoding,

    /// The raw request exceeded the hard size cap.
    #[error("request too large")]
    RequestTooLarge,
}

/// Failures produced by the `multipart/form-data` parser.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MultipartError {
    /// The body never mentioned the boundary the caller supplied.
    #[error("multipart boundary not found in body")]
    MissingBoundary,

    /// A part had no blank line separating its headers from its data.
    #[error("malformed multipart part")]
    MalformedPart,
}

/// A route template failed to compile.
///
/// [`Router::register`](crate::router::Router::register) surfaces this
/// synchronously at registration time; a bad template never reaches the
/// accept loop.
#[derive(Debug, Error)]
#[error("invalid route template `{template}`: {reason}")]
pub struct RouteError {
    /// The template as the caller wrote it.
    pub template: String,
    /// Why compilation rejected it.
    pub reason: String,
}

/// Failures raised by the plugin registry.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A plugin with the same name is already loaded.
    #[error("plugin `{0}` is already loaded")]
    DuplicateName(String),

    /// The plugin's `initialize` hook rejected the configuration.
    #[error("plugin `{name}` failed to initialize: {reason}")]
    Init {
        /// Name of the failing plugin.
        name: String,
        /// Explanation supplied by the plugin.
        reason: String,
    },

    /// A plugin declared a dependency that is not loaded (or is disabled).
    #[error("plugin `{plugin}` depends on `{dependency}`, which is not loaded")]
    MissingDependency {
        /// The dependent plugin.
        plugin: String,
        /// The missing dependency's name.
        dependency: String,
    },

    /// A plugin's `on_server_start` returned `false`, aborting startup.
    #[error("plugin `{0}` refused to start")]
    StartAborted(String),

    /// The plugin list can only change before the server starts.
    #[error("plugins cannot be added or removed while the server is running")]
    Running,
}

/// Failures loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file `{path}`: {source}")]
    Io {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid UTF-8.
    #[error("config file `{path}` is not valid UTF-8")]
    Encoding {
        /// Path that was attempted.
        path: String,
    },
}

/// Umbrella error surfaced by server startup.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be created or bound.
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),

    /// A plugin failed during publication or the start sequence.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// A plugin staged a route whose template does not compile.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// `start` was called while the server is already running.
    #[error("server is already running")]
    AlreadyRunning,
}
