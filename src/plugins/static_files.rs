#![warn(missing_docs)]

use crate::config::Config;
use crate::context::Context;
use crate::error::{PluginError, RouteError};
use crate::plugin::{Plugin, PluginDescriptor};
use crate::resolve::PathResolver;
use crate::router::Router;
use crate::types::ResponseKind;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

const FORBIDDEN_BODY: &str = "<html><body><h1>403 Forbidden</h1></body></html>";
const NOT_FOUND_BODY: &str = "<html><body><h1>404 Not Found</h1></body></html>";

/// Serves files from the configured document root under a mount prefix.
///
/// The plugin registers a catch-all `GET <mount>/*` route; the remainder
/// of the path goes through the [`PathResolver`], so directory escapes
/// answer `403` and never touch the filesystem. Content types come from
/// the file extension. Directory requests without a trailing slash are
/// redirected to the slashed form so relative links resolve.
///
/// Runs late (priority 900 by default) so API routes published by other
/// plugins win over files with colliding names.
///
/// ## Example
///
/// ```no_run
/// use aqueduct::config::Config;
/// use aqueduct::plugins::static_files::StaticFilesPlugin;
/// use aqueduct::server::Server;
///
/// let mut server = Server::new(Config::new());
/// server
///     .add_plugin(Box::new(StaticFilesPlugin::new("/")))
///     .unwrap();
/// ```
pub struct StaticFilesPlugin {
    mount: String,
    root_override: Option<PathBuf>,
    priority: i32,
    resolver: Option<Arc<PathResolver>>,
}

impl StaticFilesPlugin {
    /// A plugin serving the configured `DOC_ROOT` at `mount`.
    pub fn new(mount: impl Into<String>) -> Self {
        StaticFilesPlugin {
            mount: mount.into(),
            root_override: None,
            priority: 900,
            resolver: None,
        }
    }

    /// Overrides the document root instead of reading `DOC_ROOT`.
    pub fn with_root(mount: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        StaticFilesPlugin {
            root_override: Some(root.into()),
            ..Self::new(mount)
        }
    }

    /// Overrides the publication priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn template(&self) -> String {
        let mount = self.mount.trim_end_matches('/');
        if mount.is_empty() {
            "/*".to_string()
        } else {
            format!("{mount}/*")
        }
    }
}

impl Plugin for StaticFilesPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            name: "static-files".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "serves files from the document root".to_string(),
            priority: self.priority,
            ..Default::default()
        }
    }

    fn initialize(&mut self, config: &Config) -> Result<(), PluginError> {
        let root = self
            .root_override
            .clone()
            .unwrap_or_else(|| config.doc_root());
        let resolver =
            PathResolver::new(&root, config.default_file()).map_err(|err| PluginError::Init {
                name: "static-files".to_string(),
                reason: err.to_string(),
            })?;
        self.resolver = Some(Arc::new(resolver));
        Ok(())
    }

    fn register_routes(&mut self, router: &mut Router) -> Result<(), RouteError> {
        let resolver = match &self.resolver {
            Some(resolver) => resolver.clone(),
            None => return Ok(()),
        };
        router.get(&self.template(), move |ctx| serve(ctx, &resolver))
    }
}

fn serve(ctx: &mut Context, resolver: &PathResolver) -> ResponseKind {
    let rest = ctx.param("*").unwrap_or("").to_string();

    let target = match resolver.resolve(&rest) {
        Some(target) => target,
        None => {
            ctx.status(403).html(FORBIDDEN_BODY);
            return ResponseKind::Buffered;
        }
    };

    if target.is_dir() {
        let slashed = format!("{}/", ctx.path());
        ctx.redirect(slashed);
        return ResponseKind::Buffered;
    }

    match std::fs::read(&target) {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&target).first_or_octet_stream();
            ctx.set_header("Content-Type", mime.to_string()).body(bytes);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            ctx.status(404).html(NOT_FOUND_BODY);
        }
        Err(err) => {
            error!(%err, path = %target.display(), "failed to read static file");
            ctx.status(500).text("Internal Server Error");
        }
    }
    ResponseKind::Buffered
}
