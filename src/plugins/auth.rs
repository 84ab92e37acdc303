#![warn(missing_docs)]

use crate::config::Config;
use crate::error::PluginError;
use crate::middleware::MiddlewareChain;
use crate::plugin::{Plugin, PluginDescriptor};
use crate::types::ResponseKind;
use serde_json::json;
use tracing::info;

/// The context-state key under which the authenticated subject is stored.
pub const SUBJECT_KEY: &str = "auth.subject";

/// Bearer-token authentication as a middleware plugin.
///
/// Compares `Authorization: Bearer <token>` against the configured
/// `AUTH_TOKEN`. On success the subject is stored in context state under
/// [`SUBJECT_KEY`] for downstream handlers; otherwise the chain
/// short-circuits with a `401` JSON payload. Paths under a configured
/// public prefix skip the check.
///
/// Without an `AUTH_TOKEN` in the configuration the plugin loads but
/// registers nothing - every route stays public.
///
/// Runs early (priority 100 by default) so it fences everything later
/// plugins publish.
pub struct TokenAuthPlugin {
    token: Option<String>,
    public_prefixes: Vec<String>,
    priority: i32,
}

impl TokenAuthPlugin {
    /// An auth plugin with no public prefixes.
    pub fn new() -> Self {
        TokenAuthPlugin {
            token: None,
            public_prefixes: Vec::new(),
            priority: 100,
        }
    }

    /// Adds a path prefix that skips authentication.
    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.public_prefixes.push(prefix.into());
        self
    }

    /// Overrides the publication priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for TokenAuthPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for TokenAuthPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            name: "token-auth".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "bearer-token authentication middleware".to_string(),
            priority: self.priority,
            ..Default::default()
        }
    }

    fn initialize(&mut self, config: &Config) -> Result<(), PluginError> {
        self.token = config.auth_token().map(String::from);
        if self.token.is_none() {
            info!("AUTH_TOKEN not set; token auth stays inert");
        }
        Ok(())
    }

    fn register_middleware(&mut self, chain: &mut MiddlewareChain) {
        let token = match &self.token {
            Some(token) => token.clone(),
            None => return,
        };
        let public_prefixes = self.public_prefixes.clone();

        chain.add(move |ctx, next| {
            if public_prefixes
                .iter()
                .any(|prefix| ctx.path().starts_with(prefix.as_str()))
            {
                return next.run(ctx);
            }

            let authorized = ctx
                .header("authorization")
                .and_then(|value| value.strip_prefix("Bearer "))
                .is_some_and(|presented| presented == token);

            if authorized {
                ctx.set(SUBJECT_KEY, "bearer".to_string());
                next.run(ctx)
            } else {
                ctx.status(401).json(json!({ "error": "unauthorized" }));
                ResponseKind::Buffered
            }
        });
    }
}
