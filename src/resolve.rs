#![warn(missing_docs)]

//! Canonical-root path containment for static file serving.
//!
//! The resolver turns an untrusted request path into an absolute
//! filesystem path that is guaranteed to live under the configured
//! document root, or refuses. Refusals are logged as potential traversal
//! attempts; the static-files plugin answers them with `403 Forbidden`.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// The document root was unusable at construction time.
#[derive(Debug, Error)]
#[error("document root `{root}` does not exist or is not a directory")]
pub struct ResolveRootError {
    /// The root as the caller supplied it.
    pub root: String,
}

/// Resolves untrusted request paths against a canonicalized document root.
///
/// ## Example
///
/// ```no_run
/// use aqueduct::resolve::PathResolver;
///
/// let resolver = PathResolver::new("public", "index.html").unwrap();
///
/// // Directory requests get the default file appended.
/// assert!(resolver.resolve("docs/").is_some());
///
/// // Escapes are refused, not clamped.
/// assert!(resolver.resolve("../etc/passwd").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    default_file: String,
}

impl PathResolver {
    /// Canonicalizes `root` and verifies it is an existing directory.
    /// Plugins call this from `initialize` so a bad root fails startup,
    /// not the first request.
    pub fn new(root: impl AsRef<Path>, default_file: impl Into<String>) -> Result<Self, ResolveRootError> {
        let supplied = root.as_ref();
        let canonical = supplied
            .canonicalize()
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| ResolveRootError {
                root: supplied.display().to_string(),
            })?;
        Ok(PathResolver {
            root: canonical,
            default_file: default_file.into(),
        })
    }

    /// The canonicalized root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a requested path (already stripped of its mount prefix).
    ///
    /// Returns the absolute target path, or `None` when the request would
    /// escape the root. A trailing slash (or an empty request) selects
    /// the default file. Symbolic links inside the root are allowed; the
    /// canonicalization step re-verifies containment on the resolved
    /// target, so a link pointing outside the root is still refused.
    ///
    /// A target that does not exist resolves to its would-be path under
    /// the root - the caller turns that into a `404` when the read fails.
    pub fn resolve(&self, requested: &str) -> Option<PathBuf> {
        let mut relative = requested.trim_start_matches('/').to_string();
        if relative.is_empty() || relative.ends_with('/') {
            relative.push_str(&self.default_file);
        }

        // Collapse `.` and `..` lexically before touching the filesystem.
        // A `..` that climbs past the top is an escape, never clamped.
        let mut segments: Vec<&str> = Vec::new();
        for segment in relative.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        warn!(requested, "path traversal attempt blocked");
                        return None;
                    }
                }
                other => segments.push(other),
            }
        }

        let mut candidate = self.root.clone();
        for segment in &segments {
            // Reject raw separators and drive-relative tricks that
            // survived splitting on `/`.
            if Path::new(segment)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
            {
                warn!(requested, "path traversal attempt blocked");
                return None;
            }
            candidate.push(segment);
        }

        if candidate.exists() {
            match candidate.canonicalize() {
                Ok(canonical) if canonical.starts_with(&self.root) => Some(canonical),
                Ok(_) => {
                    warn!(requested, "resolved target escapes document root");
                    None
                }
                Err(_) => None,
            }
        } else {
            // Lexically contained but absent; the read path reports 404.
            Some(candidate)
        }
    }
}
