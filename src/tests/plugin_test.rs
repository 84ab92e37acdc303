use crate::config::Config;
use crate::error::PluginError;
use crate::middleware::MiddlewareChain;
use crate::plugin::{Plugin, PluginDescriptor, PluginRegistry};
use crate::router::Router;
use crate::types::ResponseKind;
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

/// A plugin that records every lifecycle hook into a shared log.
struct ProbePlugin {
    name: &'static str,
    priority: i32,
    enabled: bool,
    dependencies: Vec<String>,
    refuse_start: bool,
    fail_init: bool,
    log: Log,
}

impl ProbePlugin {
    fn new(name: &'static str, priority: i32, log: &Log) -> Self {
        ProbePlugin {
            name,
            priority,
            enabled: true,
            dependencies: Vec::new(),
            refuse_start: false,
            fail_init: false,
            log: log.clone(),
        }
    }

    fn record(&self, event: &str) {
        self.log.lock().unwrap().push(format!("{}:{event}", self.name));
    }
}

impl Plugin for ProbePlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            name: self.name.to_string(),
            priority: self.priority,
            enabled: self.enabled,
            dependencies: self.dependencies.clone(),
            ..Default::default()
        }
    }

    fn initialize(&mut self, _config: &Config) -> Result<(), PluginError> {
        if self.fail_init {
            return Err(PluginError::Init {
                name: self.name.to_string(),
                reason: "probe told to fail".to_string(),
            });
        }
        self.record("init");
        Ok(())
    }

    fn register_middleware(&mut self, chain: &mut MiddlewareChain) {
        let log = self.log.clone();
        let name = self.name;
        chain.add(move |ctx, next| {
            log.lock().unwrap().push(format!("{name}:mw"));
            next.run(ctx)
        });
    }

    fn on_server_start(&mut self) -> bool {
        self.record("start");
        !self.refuse_start
    }

    fn on_server_stop(&mut self) {
        self.record("stop");
    }

    fn shutdown(&mut self) {
        self.record("shutdown");
    }
}

fn registry_with(plugins: Vec<ProbePlugin>) -> PluginRegistry {
    let config = Config::new();
    let mut registry = PluginRegistry::new();
    for plugin in plugins {
        registry.add(Box::new(plugin), &config).unwrap();
    }
    registry
}

#[test]
fn duplicate_names_are_rejected() {
    let log: Log = Default::default();
    let config = Config::new();
    let mut registry = PluginRegistry::new();

    registry
        .add(Box::new(ProbePlugin::new("p", 500, &log)), &config)
        .unwrap();
    let err = registry
        .add(Box::new(ProbePlugin::new("p", 100, &log)), &config)
        .unwrap_err();

    assert!(matches!(err, PluginError::DuplicateName(name) if name == "p"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn failed_initialize_keeps_the_plugin_out() {
    let log: Log = Default::default();
    let config = Config::new();
    let mut registry = PluginRegistry::new();

    let mut probe = ProbePlugin::new("broken", 500, &log);
    probe.fail_init = true;
    assert!(registry.add(Box::new(probe), &config).is_err());
    assert!(registry.is_empty());
}

#[test]
fn lifecycle_follows_priority_and_reverses_on_stop() {
    let log: Log = Default::default();
    // Added in "wrong" order; priority must sort them.
    let mut registry = registry_with(vec![
        ProbePlugin::new("late", 900, &log),
        ProbePlugin::new("early", 100, &log),
    ]);

    let mut router = Router::new();
    let mut chain = MiddlewareChain::new();
    registry.publish(&mut router, &mut chain).unwrap();
    registry.start_all().unwrap();
    registry.stop_all();

    let events: Vec<String> = log.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "late:init", // add-time, insertion order
            "early:init",
            "early:start", // priority order
            "late:start",
            "late:stop", // reverse priority order, stop then shutdown
            "late:shutdown",
            "early:stop",
            "early:shutdown",
        ]
    );
}

#[test]
fn middleware_publishes_in_priority_order() {
    let log: Log = Default::default();
    let mut registry = registry_with(vec![
        ProbePlugin::new("second", 500, &log),
        ProbePlugin::new("first", 100, &log),
    ]);

    let mut router = Router::new();
    router
        .get("/", |_ctx| ResponseKind::Buffered)
        .unwrap();
    let mut chain = MiddlewareChain::new();
    registry.publish(&mut router, &mut chain).unwrap();

    log.lock().unwrap().clear();
    let request = crate::req::Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
    let mut ctx = crate::context::Context::new(request);
    chain.run(&mut ctx, &router);

    assert_eq!(*log.lock().unwrap(), vec!["first:mw", "second:mw"]);
}

#[test]
fn refused_start_rolls_back_already_started_plugins() {
    let log: Log = Default::default();
    let mut refuser = ProbePlugin::new("refuser", 500, &log);
    refuser.refuse_start = true;

    let mut registry = registry_with(vec![ProbePlugin::new("ok", 100, &log)]);
    registry
        .add(Box::new(refuser), &Config::new())
        .unwrap();

    let mut router = Router::new();
    let mut chain = MiddlewareChain::new();
    registry.publish(&mut router, &mut chain).unwrap();

    let err = registry.start_all().unwrap_err();
    assert!(matches!(err, PluginError::StartAborted(name) if name == "refuser"));

    let events: Vec<String> = log.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "ok:init",
            "refuser:init",
            "ok:start",
            "refuser:start",
            "ok:stop",
            "ok:shutdown",
        ]
    );
}

#[test]
fn missing_dependencies_fail_publication() {
    let log: Log = Default::default();
    let mut needy = ProbePlugin::new("needy", 500, &log);
    needy.dependencies = vec!["absent".to_string()];

    let mut registry = registry_with(vec![]);
    registry.add(Box::new(needy), &Config::new()).unwrap();

    let mut router = Router::new();
    let mut chain = MiddlewareChain::new();
    let err = registry.publish(&mut router, &mut chain).unwrap_err();
    assert!(err.to_string().contains("depends on `absent`"));
}

#[test]
fn satisfied_dependencies_pass_publication() {
    let log: Log = Default::default();
    let mut needy = ProbePlugin::new("needy", 500, &log);
    needy.dependencies = vec!["base".to_string()];

    let mut registry = registry_with(vec![ProbePlugin::new("base", 100, &log)]);
    registry.add(Box::new(needy), &Config::new()).unwrap();

    let mut router = Router::new();
    let mut chain = MiddlewareChain::new();
    assert!(registry.publish(&mut router, &mut chain).is_ok());
}

#[test]
fn disabled_plugins_are_inert() {
    let log: Log = Default::default();
    let mut sleeping = ProbePlugin::new("sleeping", 500, &log);
    sleeping.enabled = false;

    let config = Config::new();
    let mut registry = PluginRegistry::new();
    registry.add(Box::new(sleeping), &config).unwrap();

    let mut router = Router::new();
    let mut chain = MiddlewareChain::new();
    registry.publish(&mut router, &mut chain).unwrap();
    registry.start_all().unwrap();
    registry.stop_all();

    assert!(log.lock().unwrap().is_empty(), "no hook may run");
    assert!(chain.is_empty());
    assert_eq!(registry.len(), 1, "still listed, just inert");
}

#[test]
fn remove_takes_a_plugin_out() {
    let log: Log = Default::default();
    let mut registry = registry_with(vec![ProbePlugin::new("gone", 500, &log)]);
    assert!(registry.remove("gone"));
    assert!(!registry.remove("gone"));
    assert!(registry.is_empty());
}
