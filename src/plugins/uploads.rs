#![warn(missing_docs)]

use crate::config::Config;
use crate::context::Context;
use crate::error::{PluginError, RouteError};
use crate::multipart;
use crate::plugin::{Plugin, PluginDescriptor};
use crate::router::Router;
use crate::types::ResponseKind;
use bytes::Bytes;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Accepts `multipart/form-data` uploads at `POST /upload` and writes
/// the file parts to `UPLOAD_DIR` verbatim.
///
/// Client-supplied filenames are reduced to their final path component -
/// separators and dot-dot segments never reach the filesystem - and a
/// body over `MAX_UPLOAD_SIZE` answers `413` with a JSON error payload.
/// The response is a JSON manifest of what was saved.
pub struct UploadPlugin {
    route: String,
    upload_dir: PathBuf,
    max_size: u64,
}

impl UploadPlugin {
    /// An upload endpoint at the default route `/upload`.
    pub fn new() -> Self {
        Self::at("/upload")
    }

    /// An upload endpoint at a custom route.
    pub fn at(route: impl Into<String>) -> Self {
        UploadPlugin {
            route: route.into(),
            upload_dir: PathBuf::new(),
            max_size: 0,
        }
    }
}

impl Default for UploadPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for UploadPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            name: "uploads".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "multipart/form-data upload endpoint".to_string(),
            ..Default::default()
        }
    }

    fn initialize(&mut self, config: &Config) -> Result<(), PluginError> {
        self.upload_dir = config.upload_dir();
        self.max_size = config.max_upload_size();
        std::fs::create_dir_all(&self.upload_dir).map_err(|err| PluginError::Init {
            name: "uploads".to_string(),
            reason: format!(
                "cannot create upload dir `{}`: {err}",
                self.upload_dir.display()
            ),
        })?;
        Ok(())
    }

    fn register_routes(&mut self, router: &mut Router) -> Result<(), RouteError> {
        let upload_dir = self.upload_dir.clone();
        let max_size = self.max_size;
        router.post(&self.route, move |ctx| {
            receive(ctx, &upload_dir, max_size)
        })
    }
}

fn receive(ctx: &mut Context, upload_dir: &Path, max_size: u64) -> ResponseKind {
    let boundary = ctx
        .header("content-type")
        .and_then(multipart::boundary_from_content_type);
    let body: Bytes = ctx.request().body.clone();

    let boundary = match boundary {
        Some(boundary) => boundary,
        None => {
            ctx.status(400)
                .json(json!({ "error": "expected multipart/form-data with a boundary" }));
            return ResponseKind::Buffered;
        }
    };

    if body.len() as u64 > max_size {
        ctx.status(413).json(json!({ "error": "payload too large" }));
        return ResponseKind::Buffered;
    }

    let parts = match multipart::parse(&body, &boundary) {
        Ok(parts) if !parts.is_empty() => parts,
        Ok(_) => {
            ctx.status(400)
                .json(json!({ "error": "multipart body contained no parts" }));
            return ResponseKind::Buffered;
        }
        Err(err) => {
            ctx.status(400).json(json!({ "error": err.to_string() }));
            return ResponseKind::Buffered;
        }
    };

    let mut saved = Vec::new();
    for part in parts.iter().filter(|p| p.is_file()) {
        let filename = match sanitize_filename(&part.filename) {
            Some(filename) => filename,
            None => continue,
        };
        let target = upload_dir.join(&filename);
        match std::fs::write(&target, &part.data) {
            Ok(()) => {
                info!(file = %target.display(), bytes = part.data.len(), "upload saved");
                saved.push(filename);
            }
            Err(err) => {
                error!(%err, file = %target.display(), "failed to write upload");
                ctx.status(500).json(json!({ "error": "failed to store upload" }));
                return ResponseKind::Buffered;
            }
        }
    }

    if saved.is_empty() {
        ctx.status(400)
            .json(json!({ "error": "no file parts in multipart body" }));
    } else {
        ctx.status(201).json(json!({ "saved": saved }));
    }
    ResponseKind::Buffered
}

/// Reduces a client-supplied filename to a bare, safe final component.
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name)
}
