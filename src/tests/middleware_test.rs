use crate::context::Context;
use crate::middleware::MiddlewareChain;
use crate::req::Request;
use crate::router::Router;
use crate::types::ResponseKind;
use std::sync::{Arc, Mutex};

fn ctx_for(path: &str) -> Context {
    let raw = format!("GET {path} HTTP/1.1\r\n\r\n");
    Context::new(Request::parse(raw.as_bytes()).unwrap())
}

type Log = Arc<Mutex<Vec<&'static str>>>;

fn record(log: &Log, entry: &'static str) {
    log.lock().unwrap().push(entry);
}

#[test]
fn chain_runs_pre_down_and_post_up() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut router = Router::new();
    {
        let log = log.clone();
        router
            .get("/x", move |ctx| {
                record(&log, "handler");
                ctx.text("done");
                ResponseKind::Buffered
            })
            .unwrap();
    }

    let mut chain = MiddlewareChain::new();
    for name in ["m1", "m2", "m3"] {
        let log = log.clone();
        let pre: &'static str = Box::leak(format!("{name}-pre").into_boxed_str());
        let post: &'static str = Box::leak(format!("{name}-post").into_boxed_str());
        chain.add(move |ctx, next| {
            record(&log, pre);
            let kind = next.run(ctx);
            record(&log, post);
            kind
        });
    }

    let mut ctx = ctx_for("/x");
    chain.run(&mut ctx, &router);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "m1-pre", "m2-pre", "m3-pre", "handler", "m3-post", "m2-post", "m1-post",
        ]
    );
}

#[test]
fn short_circuit_skips_downstream_and_router() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut router = Router::new();
    {
        let log = log.clone();
        router
            .get("/x", move |_ctx| {
                record(&log, "H");
                ResponseKind::Buffered
            })
            .unwrap();
    }

    let mut chain = MiddlewareChain::new();
    {
        let log = log.clone();
        chain.add(move |ctx, next| {
            record(&log, "A-pre");
            let kind = next.run(ctx);
            record(&log, "A-post");
            kind
        });
    }
    {
        // Returns 401 without calling next: the chain stops here.
        chain.add(move |ctx, _next| {
            ctx.status(401).json(serde_json::json!({ "error": "unauthorized" }));
            ResponseKind::Buffered
        });
    }
    {
        let log = log.clone();
        chain.add(move |ctx, next| {
            record(&log, "C-pre");
            next.run(ctx)
        });
    }

    let mut ctx = ctx_for("/x");
    chain.run(&mut ctx, &router);

    assert_eq!(*log.lock().unwrap(), vec!["A-pre", "A-post"]);
    assert_eq!(ctx.response().status_code(), 401);
}

#[test]
fn empty_chain_goes_straight_to_the_router() {
    let mut router = Router::new();
    router
        .get("/only", |ctx| {
            ctx.text("routed");
            ResponseKind::Buffered
        })
        .unwrap();

    let chain = MiddlewareChain::new();
    let mut ctx = ctx_for("/only");
    chain.run(&mut ctx, &router);
    assert_eq!(ctx.response().body_bytes(), b"routed");
}

#[test]
fn routing_miss_after_the_chain_is_404() {
    let router = Router::new();
    let mut chain = MiddlewareChain::new();
    chain.add(|ctx, next| {
        ctx.set_header("X-Seen", "yes");
        next.run(ctx)
    });

    let mut ctx = ctx_for("/absent");
    chain.run(&mut ctx, &router);

    assert_eq!(ctx.response().status_code(), 404);
    assert_eq!(ctx.response().headers.get("x-seen"), Some("yes"));
}

#[test]
fn state_flows_from_middleware_to_handler() {
    let mut router = Router::new();
    router
        .get("/whoami", |ctx| {
            let user = ctx.get::<String>("user").cloned().unwrap_or_default();
            ctx.text(user);
            ResponseKind::Buffered
        })
        .unwrap();

    let mut chain = MiddlewareChain::new();
    chain.add(|ctx, next| {
        ctx.set("user", "alice".to_string());
        next.run(ctx)
    });

    let mut ctx = ctx_for("/whoami");
    chain.run(&mut ctx, &router);
    assert_eq!(ctx.response().body_bytes(), b"alice");
}

#[test]
fn typed_state_misses_return_none() {
    let mut ctx = ctx_for("/");
    ctx.set("n", 7u32);

    assert_eq!(ctx.get::<u32>("n"), Some(&7));
    assert_eq!(ctx.get::<String>("n"), None, "type mismatch is a miss");
    assert_eq!(ctx.get::<u32>("absent"), None);
}

#[test]
fn post_next_code_can_inspect_the_downstream_response() {
    let mut router = Router::new();
    router
        .get("/x", |ctx| {
            ctx.status(201).text("made");
            ResponseKind::Buffered
        })
        .unwrap();

    let observed = Arc::new(Mutex::new(0u16));
    let mut chain = MiddlewareChain::new();
    {
        let observed = observed.clone();
        chain.add(move |ctx, next| {
            let kind = next.run(ctx);
            *observed.lock().unwrap() = ctx.response().status_code();
            kind
        });
    }

    let mut ctx = ctx_for("/x");
    chain.run(&mut ctx, &router);
    assert_eq!(*observed.lock().unwrap(), 201);
}
