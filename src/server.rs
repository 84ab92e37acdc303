#![warn(missing_docs)]

//! The server orchestrator: owns the listener, the worker pool, the
//! router, the middleware chain, and the plugin registry; runs the
//! accept loop and the per-connection task.

use crate::config::Config;
use crate::context::Context;
use crate::error::{PluginError, ServerError};
use crate::middleware::MiddlewareChain;
use crate::plugin::{Plugin, PluginRegistry};
use crate::req::{self, MAX_REQUEST_SIZE, READ_BUFFER_SIZE, Request};
use crate::res::Response;
use crate::router::Router;
use crate::transport::{Connection, Listener};
use crate::types::ResponseKind;
use crate::workers::WorkerPool;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// A one-way shutdown latch with a condvar attached, so sleepers can be
/// woken the instant the server stops.
///
/// Streaming loops sleep on [`wait_timeout`](ShutdownSignal::wait_timeout)
/// between frames; `Server::stop` trips the latch and notifies, so no
/// stream stalls shutdown for a full frame interval.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    flag: AtomicBool,
    lock: Mutex<()>,
    cv: Condvar,
}

impl ShutdownSignal {
    /// A fresh, untripped signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Trips the latch and wakes every sleeper. Idempotent.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.cv.notify_all();
    }

    /// Sleeps up to `timeout`, returning early - with `true` - if
    /// shutdown is requested in the meantime.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_shutdown() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        while !self.is_shutdown() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (g, result) = self
                .cv
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            guard = g;
            if result.timed_out() {
                break;
            }
        }
        self.is_shutdown()
    }
}

/// The published, read-only request pipeline the accept loop shares with
/// workers. Built once at `start`; never mutated afterwards.
struct Pipeline {
    router: Router,
    chain: MiddlewareChain,
}

/// Decrements `active_connections` on every task exit path.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A cheap handle for stopping the server (and inspecting it) from
/// another thread or a signal handler.
#[derive(Clone)]
pub struct ServerHandle {
    shutdown: Arc<ShutdownSignal>,
    listener: Arc<OnceLock<Listener>>,
    running: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
    total_requests: Arc<AtomicU64>,
}

impl ServerHandle {
    /// Requests a graceful stop: trips the shutdown signal and closes
    /// the listening socket, which interrupts the blocked `accept`.
    pub fn stop(&self) {
        self.shutdown.trigger();
        if let Some(listener) = self.listener.get() {
            listener.unblock();
        }
    }

    /// The bound address, once the server has started. Binding port 0
    /// picks an ephemeral port; this is how you learn which.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.get().map(Listener::local_addr)
    }

    /// Whether the accept loop is live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Connections accepted since start.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::SeqCst)
    }
}

/// The HTTP server.
///
/// Construction takes the loaded [`Config`] by value - there is no
/// process-wide configuration. Routes, middleware, and plugins are all
/// registered before [`start`](Server::start); the route table and the
/// middleware chain are frozen once the accept loop is live.
///
/// ## Example
///
/// ```no_run
/// use aqueduct::config::Config;
/// use aqueduct::server::Server;
/// use aqueduct::types::ResponseKind;
///
/// let mut config = Config::new();
/// config.set("PORT", "8080");
///
/// let mut server = Server::new(config);
/// server
///     .router()
///     .get("/hello", |ctx| {
///         ctx.text("world");
///         ResponseKind::Buffered
///     })
///     .unwrap();
///
/// server.start().unwrap(); // blocks until stop()
/// ```
pub struct Server {
    config: Arc<Config>,
    router: Router,
    chain: MiddlewareChain,
    plugins: PluginRegistry,
    shutdown: Arc<ShutdownSignal>,
    listener: Arc<OnceLock<Listener>>,
    running: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
    total_requests: Arc<AtomicU64>,
}

impl Server {
    /// Builds a server from a loaded configuration.
    pub fn new(config: Config) -> Self {
        Server {
            config: Arc::new(config),
            router: Router::new(),
            chain: MiddlewareChain::new(),
            plugins: PluginRegistry::new(),
            shutdown: Arc::new(ShutdownSignal::new()),
            listener: Arc::new(OnceLock::new()),
            running: Arc::new(AtomicBool::new(false)),
            active_connections: Arc::new(AtomicUsize::new(0)),
            total_requests: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The configuration this server was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Direct access to the route table for application routes.
    /// Must not be called after [`start`](Server::start).
    pub fn router(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Appends an application middleware. Must not be called after
    /// [`start`](Server::start).
    pub fn middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context, crate::middleware::Next<'_>) -> ResponseKind + Send + Sync + 'static,
    {
        self.chain.add(middleware);
        self
    }

    /// Loads a plugin: duplicate names are rejected, `initialize` runs
    /// immediately, and the plugin's routes and middleware are published
    /// at start time in priority order.
    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(PluginError::Running);
        }
        self.plugins.add(plugin, &self.config)
    }

    /// Unloads a plugin by name. Returns whether one was removed.
    pub fn remove_plugin(&mut self, name: &str) -> Result<bool, PluginError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(PluginError::Running);
        }
        Ok(self.plugins.remove(name))
    }

    /// A handle for stopping or observing the server from elsewhere.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.shutdown.clone(),
            listener: self.listener.clone(),
            running: self.running.clone(),
            active_connections: self.active_connections.clone(),
            total_requests: self.total_requests.clone(),
        }
    }

    /// Requests a graceful stop. Equivalent to `self.handle().stop()`.
    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Publishes plugin registrations, runs the plugin start sequence,
    /// binds the listener, and enters the accept loop.
    ///
    /// Blocks the calling thread until [`stop`](Server::stop) is invoked
    /// from another thread (or a signal handler). Startup failures -
    /// bind errors, a refused plugin start - surface here and the accept
    /// loop is never entered.
    pub fn start(&mut self) -> Result<(), ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        let mut router = std::mem::take(&mut self.router);
        let mut chain = std::mem::take(&mut self.chain);

        if let Err(err) = self.plugins.publish(&mut router, &mut chain) {
            self.running.store(false, Ordering::SeqCst);
            return Err(err);
        }
        if let Err(err) = self.plugins.start_all() {
            self.running.store(false, Ordering::SeqCst);
            return Err(err.into());
        }

        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.config.port());
        let listener = match Listener::bind(addr) {
            Ok(listener) => listener,
            Err(err) => {
                error!(%err, "startup failed");
                self.plugins.stop_all();
                self.running.store(false, Ordering::SeqCst);
                return Err(err.into());
            }
        };

        if self.listener.set(listener).is_err() {
            // A previous start already consumed this server.
            self.running.store(false, Ordering::SeqCst);
            return Err(ServerError::AlreadyRunning);
        }
        let listener = match self.listener.get() {
            Some(listener) => listener,
            None => {
                self.running.store(false, Ordering::SeqCst);
                return Err(ServerError::AlreadyRunning);
            }
        };

        let workers = self.config.thread_count();
        let queue_cap = self.config.queue_cap();
        let mut pool = WorkerPool::new(workers, queue_cap);
        let pipeline = Arc::new(Pipeline { router, chain });

        info!(
            addr = %listener.local_addr(),
            workers,
            queue_cap,
            routes = pipeline.router.len(),
            middleware = pipeline.chain.len(),
            "server listening"
        );

        while !self.shutdown.is_shutdown() {
            match listener.accept() {
                Ok((conn, peer)) => {
                    self.total_requests.fetch_add(1, Ordering::SeqCst);
                    self.active_connections.fetch_add(1, Ordering::SeqCst);

                    let pipeline = pipeline.clone();
                    let shutdown = self.shutdown.clone();
                    let guard = ActiveGuard(self.active_connections.clone());

                    // submit blocks when the queue is full; that is the
                    // back-pressure story, not a 503.
                    pool.submit(move || {
                        let _guard = guard;
                        handle_connection(conn, peer, &pipeline, &shutdown);
                    });
                }
                Err(err) => {
                    if self.shutdown.is_shutdown() {
                        break;
                    }
                    error!(%err, "accept failed; leaving accept loop");
                    self.shutdown.trigger();
                    break;
                }
            }
        }

        info!("draining worker pool");
        pool.shutdown();
        self.plugins.stop_all();
        self.running.store(false, Ordering::SeqCst);

        info!(
            total_requests = self.total_requests.load(Ordering::SeqCst),
            active_connections = self.active_connections.load(Ordering::SeqCst),
            "server stopped"
        );
        Ok(())
    }

    /// Connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Connections accepted since start.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::SeqCst)
    }
}

/// The per-connection task: one read (widened by `Content-Length`), one
/// parse, one trip through the pipeline, one serialized write - or a
/// hand-off to a stream continuation.
fn handle_connection(
    mut conn: Connection,
    peer: SocketAddr,
    pipeline: &Pipeline,
    shutdown: &ShutdownSignal,
) {
    let raw = match read_request(&mut conn) {
        Ok(Some(raw)) => raw,
        Ok(None) => return, // orderly close before any bytes
        Err(err) => {
            warn!(%err, %peer, "read failed");
            return;
        }
    };

    let request = match Request::parse(&raw) {
        Ok(request) => request,
        Err(err) => {
            let mut response = Response::new();
            response.status(400).text(err.to_string());
            if let Err(err) = conn.send_all(&response.serialize()) {
                warn!(%err, %peer, "failed to write 400");
            }
            return;
        }
    };

    debug!(%peer, method = %request.method, path = %request.path, "request");
    let mut ctx = Context::new(request);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        pipeline.chain.run(&mut ctx, &pipeline.router)
    }));

    match outcome {
        Ok(ResponseKind::Buffered) => {
            let wire = ctx.into_response().serialize();
            if let Err(err) = conn.send_all(&wire) {
                warn!(%err, %peer, "send failed");
            }
        }
        Ok(ResponseKind::Stream(continuation)) => {
            // The continuation owns the socket from here; buffered
            // serialization is skipped entirely.
            if let Err(err) = continuation(conn, shutdown) {
                warn!(%err, %peer, "stream ended with error");
            }
        }
        Err(_) => {
            error!(%peer, "handler panicked");
            let mut response = Response::new();
            response.status(500).text("Internal Server Error");
            if let Err(err) = conn.send_all(&response.serialize()) {
                warn!(%err, %peer, "failed to write 500");
            }
        }
    }
}

/// Reads one request: a first 16 KiB read, widened into a bounded loop
/// when the head's `Content-Length` promises more body than arrived.
/// Returns `None` when the peer closed before sending anything.
fn read_request(conn: &mut Connection) -> io::Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let n = conn.recv(&mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);

    if let Some(total) = req::expected_total_len(&buf) {
        // Stop as soon as the cap is breached; the parser turns an
        // oversized buffer into a 400.
        while buf.len() < total && buf.len() <= MAX_REQUEST_SIZE {
            let want = READ_BUFFER_SIZE.min(total - buf.len());
            let mut chunk = vec![0u8; want];
            let n = conn.recv(&mut chunk)?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    Ok(Some(buf))
}
