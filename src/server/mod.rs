//! REST server.
//!
//! Handlers are registered per verb; the server routes each request through
//! the pre chain, the router and the matched route's chain, then formats the
//! payload it was sent.
//!
//! # Features
//!
//! - **HTTP/1.1 and HTTP/2** - Automatic detection, ALPN over TLS
//! - **TLS/HTTPS** - rustls with PEM certificate and key
//! - **Graceful Shutdown** - Connection draining with configurable timeout
//! - **Versioned Routes** - `Accept-Version` aware routing
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_rest::core::{Request, Response};
//! use tokio_rest::middleware::{query_parser, HandlerResult, Next, QueryParserOptions};
//! use tokio_rest::server::{create_server, ServerOptions};
//!
//! fn hello(req: &mut Request, res: &mut Response) -> HandlerResult {
//!     res.send(format!("hello {}", req.params["name"]));
//!     Ok(Next::Stop)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = create_server(ServerOptions::new("hello"))?;
//!     server.use_handler(query_parser(QueryParserOptions::default()));
//!     server.get("/hello/:name", hello)?;
//!
//!     let addr = server.listen("127.0.0.1:8080".parse()?).await?;
//!     println!("{} listening at {}", server.name(), addr);
//!     tokio::signal::ctrl_c().await?;
//!     server.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Graceful Shutdown
//!
//! [`Server::close`] stops the accept loops, asks every connection to finish
//! its in-flight requests, then waits up to the drain timeout for them.

mod connection;
mod dispatch;
mod options;

use std::collections::HashMap;
use std::fmt;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::pki_types::CertificateDer;
use tokio_rustls::rustls::ServerConfig as RustlsConfig;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

pub use options::{ResponseTimeFormatter, ServerError, ServerOptions, DEFAULT_MAX_BODY_SIZE};

use connection::{ConnectionContext, ConnectionGuard};
use dispatch::{read, write, Dispatcher};

use crate::core::Request;
use crate::middleware::{default_response_headers, AfterHandler, HandlerChain, IntoChain};
use crate::router::{Route, RouteOptions, Router, RouterError, RouterOptions};

/// Bound address, as reported by [`Server::address`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerAddress {
    pub port: u16,
    /// `IPv4` or `IPv6`.
    pub family: &'static str,
    pub address: String,
}

/// A REST server.
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    versions: Vec<String>,
    acceptable: Vec<String>,
    tls_acceptor: Option<TlsAcceptor>,
    http2: bool,
    handle_upgrades: bool,
    max_body_size: usize,
    workers: usize,
    drain_timeout: Duration,
    header_timeout: Duration,
    /// Active connections counter
    active_connections: Arc<AtomicUsize>,
    local_addr: OnceLock<SocketAddr>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    shutdown_initiated: AtomicBool,
}

/// Create a server.
///
/// Fails when TLS is configured but the certificate or key cannot be loaded.
pub fn create_server(options: ServerOptions) -> Result<Server, ServerError> {
    Server::new(options)
}

impl Server {
    pub fn new(options: ServerOptions) -> Result<Self, ServerError> {
        let tls_acceptor = if options.has_tls() {
            let config = load_tls_config(&options)?;
            Some(TlsAcceptor::from(Arc::new(config)))
        } else {
            None
        };

        let router = options.router.unwrap_or_else(|| {
            Router::new(RouterOptions {
                name: options.name.clone(),
                versions: options.version.clone(),
                content_type: Vec::new(),
                strict_routing: options.strict_routing,
            })
        });

        let acceptable = options
            .acceptable
            .unwrap_or_else(|| options.formatters.types().to_vec());
        let response_headers = options
            .response_headers
            .unwrap_or_else(|| default_response_headers(options.name.clone()));

        let dispatcher = Arc::new(Dispatcher {
            name: options.name,
            formatters: options.formatters,
            router: RwLock::new(router),
            pre: RwLock::new(HandlerChain::new()),
            chain: RwLock::new(HandlerChain::new()),
            routes: RwLock::new(HashMap::new()),
            after: RwLock::new(Vec::new()),
            response_headers,
            response_time_header: options.response_time_header,
            response_time_formatter: options.response_time_formatter,
            handle_upgrades: options.handle_upgrades,
            cors: options.cors,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            dispatcher,
            versions: options.version,
            acceptable,
            tls_acceptor,
            http2: options.http2,
            handle_upgrades: options.handle_upgrades,
            max_body_size: options.max_body_size,
            workers: options.workers,
            drain_timeout: options.drain_timeout,
            header_timeout: options.header_timeout,
            active_connections: Arc::new(AtomicUsize::new(0)),
            local_addr: OnceLock::new(),
            handles: Mutex::new(Vec::new()),
            shutdown_tx,
            shutdown_rx,
            shutdown_initiated: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.dispatcher.name
    }

    /// Default route versions.
    #[inline]
    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    /// Media types this server can produce.
    #[inline]
    pub fn acceptable(&self) -> &[String] {
        &self.acceptable
    }

    /// Handlers run before routing.
    pub fn pre(&self, handlers: impl IntoChain) -> &Self {
        write(&self.dispatcher.pre).extend(&handlers.into_chain());
        self
    }

    /// Handlers copied into every route registered afterwards.
    pub fn use_handler(&self, handlers: impl IntoChain) -> &Self {
        write(&self.dispatcher.chain).extend(&handlers.into_chain());
        self
    }

    /// Register an `after` hook.
    pub fn on_after<H: AfterHandler + 'static>(&self, hook: H) -> &Self {
        write(&self.dispatcher.after).push(Arc::new(hook));
        self
    }

    pub fn get(
        &self,
        options: impl Into<RouteOptions>,
        handlers: impl IntoChain,
    ) -> Result<Arc<Route>, ServerError> {
        self.add_route(Method::GET, options.into(), handlers.into_chain())
    }

    pub fn head(
        &self,
        options: impl Into<RouteOptions>,
        handlers: impl IntoChain,
    ) -> Result<Arc<Route>, ServerError> {
        self.add_route(Method::HEAD, options.into(), handlers.into_chain())
    }

    pub fn post(
        &self,
        options: impl Into<RouteOptions>,
        handlers: impl IntoChain,
    ) -> Result<Arc<Route>, ServerError> {
        self.add_route(Method::POST, options.into(), handlers.into_chain())
    }

    pub fn put(
        &self,
        options: impl Into<RouteOptions>,
        handlers: impl IntoChain,
    ) -> Result<Arc<Route>, ServerError> {
        self.add_route(Method::PUT, options.into(), handlers.into_chain())
    }

    pub fn patch(
        &self,
        options: impl Into<RouteOptions>,
        handlers: impl IntoChain,
    ) -> Result<Arc<Route>, ServerError> {
        self.add_route(Method::PATCH, options.into(), handlers.into_chain())
    }

    pub fn del(
        &self,
        options: impl Into<RouteOptions>,
        handlers: impl IntoChain,
    ) -> Result<Arc<Route>, ServerError> {
        self.add_route(Method::DELETE, options.into(), handlers.into_chain())
    }

    pub fn opts(
        &self,
        options: impl Into<RouteOptions>,
        handlers: impl IntoChain,
    ) -> Result<Arc<Route>, ServerError> {
        self.add_route(Method::OPTIONS, options.into(), handlers.into_chain())
    }

    fn add_route(
        &self,
        method: Method,
        options: RouteOptions,
        handlers: HandlerChain,
    ) -> Result<Arc<Route>, ServerError> {
        let route = {
            let mut router = write(&self.dispatcher.router);
            let name = router.mount(options.method(method))?;
            router
                .get(&name)
                .cloned()
                .ok_or(RouterError::UnknownRoute(name))?
        };

        let mut chain = read(&self.dispatcher.chain).clone();
        chain.extend(&handlers);
        debug!(
            route = %route.name,
            method = %route.method,
            path = %route.path,
            handlers = ?chain,
            "route registered"
        );
        write(&self.dispatcher.routes).insert(route.name.clone(), chain);
        Ok(route)
    }

    /// Remove a route; returns false when no route has that name.
    pub fn rm(&self, name: &str) -> bool {
        let removed = write(&self.dispatcher.router).unmount(name).is_some();
        if removed {
            write(&self.dispatcher.routes).remove(name);
        }
        removed
    }

    /// Mounted routes, sorted by name.
    pub fn routes(&self) -> Vec<Arc<Route>> {
        let mut routes: Vec<_> = read(&self.dispatcher.router)
            .mounts()
            .values()
            .cloned()
            .collect();
        routes.sort_by(|a, b| a.name.cmp(&b.name));
        routes
    }

    /// Handler names registered for a route.
    pub fn chain_names(&self, route: &str) -> Option<Vec<String>> {
        read(&self.dispatcher.routes)
            .get(route)
            .map(|c| c.names().into_iter().map(str::to_string).collect())
    }

    /// Build a URL for a named route.
    pub fn render(
        &self,
        name: &str,
        params: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<String, RouterError> {
        read(&self.dispatcher.router).render(name, params, query)
    }

    /// Run a request through the server without a socket.
    pub async fn inject(&self, req: http::Request<Bytes>) -> http::Response<Bytes> {
        self.dispatcher.dispatch(Request::from(req)).await
    }

    /// Get current active connections count.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn address(&self) -> Option<ServerAddress> {
        self.local_addr.get().map(|addr| ServerAddress {
            port: addr.port(),
            family: if addr.is_ipv6() { "IPv6" } else { "IPv4" },
            address: addr.ip().to_string(),
        })
    }

    /// `http(s)://host:port` once listening.
    pub fn url(&self) -> Option<String> {
        let scheme = if self.tls_acceptor.is_some() {
            "https"
        } else {
            "http"
        };
        self.local_addr.get().map(|addr| format!("{}://{}", scheme, addr))
    }

    /// Bind `addr` and serve in the background. Returns the bound address
    /// (useful with port 0).
    pub async fn listen(&self, addr: SocketAddr) -> Result<SocketAddr, ServerError> {
        if let Some(bound) = self.local_addr.get() {
            return Err(ServerError::AlreadyListening(*bound));
        }

        let std_listener = create_listener(addr)?;
        let listener = Arc::new(TcpListener::from_std(std_listener)?);
        let local = listener.local_addr()?;
        if self.local_addr.set(local).is_err() {
            return Err(ServerError::AlreadyListening(local));
        }

        let workers = if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        };

        let ctx = Arc::new(ConnectionContext {
            dispatcher: Arc::clone(&self.dispatcher),
            header_timeout: self.header_timeout,
            http2: self.http2,
            handle_upgrades: self.handle_upgrades,
            max_body_size: self.max_body_size,
        });

        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        for worker_id in 0..workers {
            let listener = Arc::clone(&listener);
            let ctx = Arc::clone(&ctx);
            let tls_acceptor = self.tls_acceptor.clone();
            let mut shutdown_rx = self.shutdown_rx.clone();
            let conn_shutdown_rx = self.shutdown_rx.clone();
            let active_connections = Arc::clone(&self.active_connections);

            handles.push(tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                loop {
                    tokio::select! {
                        result = listener.accept() => {
                            let (stream, remote_addr) = match result {
                                Ok(conn) => conn,
                                Err(e) => {
                                    error!("Worker {}: Accept error: {}", worker_id, e);
                                    continue;
                                }
                            };

                            let _ = stream.set_nodelay(true);

                            let keepalive = TcpKeepalive::new()
                                .with_time(Duration::from_secs(5))
                                .with_interval(Duration::from_secs(1))
                                .with_retries(3);
                            let _ = SockRef::from(&stream).set_tcp_keepalive(&keepalive);

                            // Counted before the task starts so a concurrent close() waits for it.
                            let guard = ConnectionGuard::new(&active_connections);
                            let ctx = Arc::clone(&ctx);
                            let tls = tls_acceptor.clone();
                            let conn_shutdown = conn_shutdown_rx.clone();
                            tokio::spawn(async move {
                                ctx.handle_connection(stream, remote_addr, tls, conn_shutdown, guard)
                                    .await;
                            });
                        }
                        _ = shutdown_rx.changed() => {
                            debug!("Worker {} received shutdown signal, stopping accept loop", worker_id);
                            break;
                        }
                    }
                }
            }));
        }

        info!(
            "{} listening at {} (workers: {}, http2: {})",
            self.name(),
            self.url().unwrap_or_else(|| local.to_string()),
            workers,
            self.http2
        );
        Ok(local)
    }

    /// Stop accepting, drain connections, and wait for the accept loops.
    ///
    /// Returns false when the drain timeout elapsed with connections open.
    pub async fn close(&self) -> bool {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return self.active_connections() == 0;
        }
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<_> = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }

        let drained = self.wait_for_drain(self.drain_timeout).await;
        info!(server = %self.name(), drained, "server closed");
        drained
    }

    /// Wait for all active connections to drain.
    /// Returns true if drained successfully, false if timeout was reached.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(50);

        loop {
            let active = self.active_connections.load(Ordering::SeqCst);
            if active == 0 {
                return true;
            }

            if start.elapsed() >= timeout {
                warn!("Drain timeout reached with {} active connections", active);
                return false;
            }

            debug!("Waiting for {} connections to drain...", active);
            tokio::time::sleep(check_interval).await;
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", read(&self.dispatcher.router))
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name())
            .field("versions", &self.versions)
            .field("url", &self.url())
            .finish_non_exhaustive()
    }
}

fn load_tls_config(options: &ServerOptions) -> Result<RustlsConfig, ServerError> {
    let cert_path = options
        .certificate
        .as_deref()
        .ok_or_else(|| ServerError::Tls("certificate path not set".into()))?;
    let key_path = options
        .key
        .as_deref()
        .ok_or_else(|| ServerError::Tls("key path not set".into()))?;

    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut BufReader::new(open(cert_path)?))
            .filter_map(|r| r.ok())
            .collect();
    if certs.is_empty() {
        return Err(ServerError::Tls(format!(
            "no certificates found in {}",
            cert_path.display()
        )));
    }

    let key = rustls_pemfile::private_key(&mut BufReader::new(open(key_path)?))?
        .ok_or_else(|| ServerError::Tls(format!("no private key found in {}", key_path.display())))?;

    // Both ring and aws-lc-rs are compiled in, so the provider is picked here
    // rather than left to the process default.
    let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
    let mut tls_config = RustlsConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ServerError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Tls(e.to_string()))?;

    tls_config.alpn_protocols = if options.http2 {
        vec![b"h2".to_vec(), b"http/1.1".to_vec()]
    } else {
        vec![b"http/1.1".to_vec()]
    };
    Ok(tls_config)
}

fn open(path: &Path) -> Result<std::fs::File, ServerError> {
    std::fs::File::open(path)
        .map_err(|e| ServerError::Tls(format!("cannot open {}: {}", path.display(), e)))
}

fn create_listener(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    Ok(socket.into())
}
