#![warn(missing_docs)]

//! The plugin surface: the [`Plugin`] trait, its descriptor, and the
//! registry that owns loaded plugins and drives their lifecycle.
//!
//! Plugins extend the server at startup by staging routes and middleware;
//! the server publishes everything staged when it starts, in priority
//! order (lower priority first, stable for ties). The same order governs
//! `on_server_start`; stop and shutdown run in reverse, so the last
//! plugin started is the first torn down.

use crate::config::Config;
use crate::error::{PluginError, ServerError};
use crate::middleware::MiddlewareChain;
use crate::router::Router;
use tracing::{debug, info};

/// Metadata a plugin reports about itself.
///
/// Only `name` is mandatory in practice; everything else has a neutral
/// default. `priority` orders publication and lifecycle hooks - lower
/// runs first. Declared `dependencies` are verified to be loaded (and
/// enabled) before the server starts.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    /// Unique name; duplicates are rejected at `add_plugin` time.
    pub name: String,
    /// Plugin version, free-form.
    pub version: String,
    /// One-line description for logs and listings.
    pub description: String,
    /// Author attribution, free-form.
    pub author: String,
    /// Publication and lifecycle order; lower runs first. Default 500.
    pub priority: i32,
    /// Disabled plugins stay in the list but none of their hooks run.
    pub enabled: bool,
    /// Names of plugins that must be loaded for this one to work.
    pub dependencies: Vec<String>,
}

impl Default for PluginDescriptor {
    fn default() -> Self {
        PluginDescriptor {
            name: String::new(),
            version: String::new(),
            description: String::new(),
            author: String::new(),
            priority: 500,
            enabled: true,
            dependencies: Vec::new(),
        }
    }
}

impl PluginDescriptor {
    /// A descriptor with the given name and the defaults for the rest.
    pub fn named(name: impl Into<String>) -> Self {
        PluginDescriptor {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A server extension.
///
/// Lifecycle, in order: `initialize` at [`add_plugin`] time (a failure
/// rejects the plugin); `register_routes` and `register_middleware` when
/// the server publishes staged registrations at start; `on_server_start`
/// right before the accept loop; `on_server_stop` then `shutdown` at the
/// stop boundary, in reverse start order. `shutdown` must not fail - it
/// is the last-resort release of plugin resources.
///
/// [`add_plugin`]: crate::server::Server::add_plugin
pub trait Plugin: Send {
    /// Reports this plugin's metadata. Called repeatedly; keep it cheap.
    fn descriptor(&self) -> PluginDescriptor;

    /// Validates configuration and acquires startup resources.
    fn initialize(&mut self, config: &Config) -> Result<(), PluginError>;

    /// Stages this plugin's routes. Default: none.
    fn register_routes(&mut self, _router: &mut Router) -> Result<(), crate::error::RouteError> {
        Ok(())
    }

    /// Stages this plugin's middleware. Default: none.
    fn register_middleware(&mut self, _chain: &mut MiddlewareChain) {}

    /// Last chance to refuse startup. Returning `false` aborts the whole
    /// server start; plugins that already started are rolled back in
    /// reverse order.
    fn on_server_start(&mut self) -> bool {
        true
    }

    /// The server is leaving its accept loop.
    fn on_server_stop(&mut self) {}

    /// Releases plugin resources. Must not fail.
    fn shutdown(&mut self) {}
}

struct PluginEntry {
    plugin: Box<dyn Plugin>,
    descriptor: PluginDescriptor,
}

/// The ordered collection of loaded plugins.
#[derive(Default)]
pub struct PluginRegistry {
    entries: Vec<PluginEntry>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin: rejects duplicate names, runs `initialize`
    /// (enabled plugins only), and appends on success.
    pub fn add(&mut self, mut plugin: Box<dyn Plugin>, config: &Config) -> Result<(), PluginError> {
        let descriptor = plugin.descriptor();
        if self
            .entries
            .iter()
            .any(|e| e.descriptor.name == descriptor.name)
        {
            return Err(PluginError::DuplicateName(descriptor.name));
        }

        if descriptor.enabled {
            plugin.initialize(config)?;
            info!(plugin = %descriptor.name, version = %descriptor.version, "plugin initialized");
        } else {
            info!(plugin = %descriptor.name, "plugin is disabled; skipping initialization");
        }

        self.entries.push(PluginEntry { plugin, descriptor });
        Ok(())
    }

    /// Removes a plugin by name. Returns whether one was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.descriptor.name != name);
        self.entries.len() != before
    }

    /// Number of loaded plugins, disabled ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no plugins are loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loaded plugin names, in current (priority-sorted after publish)
    /// order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.descriptor.name.clone())
            .collect()
    }

    /// Sorts by priority (stable), verifies dependencies, and lets every
    /// enabled plugin stage its routes and middleware - in that order,
    /// so priority governs pipeline position as well as lifecycle.
    pub(crate) fn publish(
        &mut self,
        router: &mut Router,
        chain: &mut MiddlewareChain,
    ) -> Result<(), ServerError> {
        self.entries.sort_by_key(|e| e.descriptor.priority);

        for entry in &self.entries {
            if !entry.descriptor.enabled {
                continue;
            }
            for dependency in &entry.descriptor.dependencies {
                let satisfied = self
                    .entries
                    .iter()
                    .any(|e| e.descriptor.enabled && e.descriptor.name == *dependency);
                if !satisfied {
                    return Err(PluginError::MissingDependency {
                        plugin: entry.descriptor.name.clone(),
                        dependency: dependency.clone(),
                    }
                    .into());
                }
            }
        }

        for entry in &mut self.entries {
            if !entry.descriptor.enabled {
                continue;
            }
            entry.plugin.register_routes(router)?;
            entry.plugin.register_middleware(chain);
            debug!(plugin = %entry.descriptor.name, "plugin registrations published");
        }

        Ok(())
    }

    /// Runs `on_server_start` in priority order. A refusal rolls already
    /// started plugins back (stop + shutdown, reverse order) and aborts.
    pub(crate) fn start_all(&mut self) -> Result<(), PluginError> {
        for i in 0..self.entries.len() {
            if !self.entries[i].descriptor.enabled {
                continue;
            }
            if !self.entries[i].plugin.on_server_start() {
                let refused = self.entries[i].descriptor.name.clone();
                for j in (0..i).rev() {
                    if !self.entries[j].descriptor.enabled {
                        continue;
                    }
                    self.entries[j].plugin.on_server_stop();
                    self.entries[j].plugin.shutdown();
                }
                return Err(PluginError::StartAborted(refused));
            }
        }
        Ok(())
    }

    /// Runs `on_server_stop` then `shutdown` on every enabled plugin, in
    /// reverse start order.
    pub(crate) fn stop_all(&mut self) {
        for entry in self.entries.iter_mut().rev() {
            if !entry.descriptor.enabled {
                continue;
            }
            entry.plugin.on_server_stop();
            entry.plugin.shutdown();
            debug!(plugin = %entry.descriptor.name, "plugin stopped");
        }
    }
}
