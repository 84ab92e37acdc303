#![warn(missing_docs)]

//! The `KEY=VALUE` configuration store.
//!
//! The format is deliberately small: UTF-8 text, one `KEY=VALUE` pair per
//! line, `#` starts a line comment, keys are case-sensitive. Unknown keys
//! are preserved (plugins may consume them) but ignored by the core.
//!
//! A [`Config`] is a plain value. It is loaded once in `main`, handed to
//! [`Server::new`](crate::server::Server::new), and passed by reference to
//! every plugin's `initialize` hook. Nothing mutates it after startup, so
//! there is no global store and no locking.

use crate::error::ConfigError;
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default cap on an upload request body: 10 MiB.
const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Default bound of the worker pool's task queue.
const DEFAULT_QUEUE_CAP: usize = 1024;

/// A loaded configuration: a case-sensitive key/value map with typed,
/// defaulted accessors for the keys the core consumes.
///
/// ## Example
///
/// ```
/// use aqueduct::config::Config;
///
/// let config = Config::parse_str("PORT=9090\n# comment\nDOC_ROOT=www\n");
/// assert_eq!(config.port(), 9090);
/// assert_eq!(config.doc_root(), std::path::Path::new("www"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: AHashMap<String, String>,
}

impl Config {
    /// Creates an empty configuration; every accessor returns its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| ConfigError::Encoding {
            path: path.display().to_string(),
        })?;
        Ok(Self::parse_str(&text))
    }

    /// Parses configuration text. Lines that are blank, comments, or
    /// missing an `=` are skipped (the latter with a warning).
    pub fn parse_str(text: &str) -> Self {
        let mut values = AHashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    values.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => warn!(line = lineno + 1, "config line has no `=`, skipping"),
            }
        }
        Config { values }
    }

    /// Raw access to a value. Unknown keys set in the file are reachable
    /// here even though the core ignores them.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Sets a value programmatically. Useful for tests and for embedding
    /// the server without a config file.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// `PORT` - TCP port to listen on. Default `8080`.
    pub fn port(&self) -> u16 {
        self.parsed("PORT", 8080)
    }

    /// `DOC_ROOT` - document root for static serving. Default `public`.
    pub fn doc_root(&self) -> PathBuf {
        self.get("DOC_ROOT").unwrap_or("public").into()
    }

    /// `THREAD_COUNT` - worker pool size. Default: CPU count.
    pub fn thread_count(&self) -> usize {
        let n = self.parsed("THREAD_COUNT", num_cpus::get());
        if n == 0 { num_cpus::get() } else { n }
    }

    /// `UPLOAD_DIR` - where uploaded files land. Default `uploads`.
    pub fn upload_dir(&self) -> PathBuf {
        self.get("UPLOAD_DIR").unwrap_or("uploads").into()
    }

    /// `MAX_UPLOAD_SIZE` - per-request upload cap in bytes. Default 10 MiB.
    pub fn max_upload_size(&self) -> u64 {
        self.parsed("MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE)
    }

    /// `AUTH_TOKEN` - bearer token for the auth plugin. No default; the
    /// auth plugin stays inert when unset.
    pub fn auth_token(&self) -> Option<&str> {
        self.get("AUTH_TOKEN").filter(|t| !t.is_empty())
    }

    /// `DEFAULT_FILE` - file served for directory requests. Default
    /// `index.html`.
    pub fn default_file(&self) -> &str {
        self.get("DEFAULT_FILE").unwrap_or("index.html")
    }

    /// `QUEUE_CAP` - bound of the worker pool's task queue. Default 1024.
    pub fn queue_cap(&self) -> usize {
        let cap = self.parsed("QUEUE_CAP", DEFAULT_QUEUE_CAP);
        if cap == 0 { DEFAULT_QUEUE_CAP } else { cap }
    }

    fn parsed<T: std::str::FromStr + Copy>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(key, value = raw, "config value does not parse, using default");
                default
            }),
        }
    }
}
