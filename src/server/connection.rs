//! TCP/TLS connection handling.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming as IncomingBody;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::debug;

use super::dispatch::Dispatcher;
use crate::core::Request;
use crate::errors::{HttpError, HttpErrorKind};

const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Check if an error is a common connection reset or timeout.
#[inline]
fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
        || err_str.contains("timed out")
        || err_str.contains("deadline has elapsed")
        || err_str.contains("HeaderTimeout")
}

/// Counts a connection as active from accept until drop.
pub(crate) struct ConnectionGuard {
    active: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Per-server connection settings shared by all accept loops.
pub(crate) struct ConnectionContext {
    pub dispatcher: Arc<Dispatcher>,
    pub header_timeout: Duration,
    pub http2: bool,
    pub handle_upgrades: bool,
    pub max_body_size: usize,
}

impl ConnectionContext {
    /// Serve one accepted TCP connection (with optional TLS) until it closes
    /// or shutdown completes. `guard` is released when the connection ends.
    pub async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        tls_acceptor: Option<TlsAcceptor>,
        shutdown_rx: watch::Receiver<bool>,
        guard: ConnectionGuard,
    ) {

        match tls_acceptor {
            Some(acceptor) => {
                match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                    Ok(Ok(tls_stream)) => {
                        let alpn = tls_stream
                            .get_ref()
                            .1
                            .alpn_protocol()
                            .map(|p| String::from_utf8_lossy(p).to_string());
                        debug!(peer = %remote_addr, alpn = alpn.as_deref(), "TLS established");
                        Arc::clone(&self)
                            .serve(TokioIo::new(tls_stream), remote_addr, true, shutdown_rx)
                            .await;
                    }
                    Ok(Err(e)) => debug!("TLS handshake failed: {:?}", e),
                    Err(_) => debug!("TLS handshake timeout: {:?}", remote_addr),
                }
            }
            None => {
                Arc::clone(&self)
                    .serve(TokioIo::new(stream), remote_addr, false, shutdown_rx)
                    .await;
            }
        }

        drop(guard);
    }

    fn builder(&self) -> auto::Builder<TokioExecutor> {
        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(Some(self.header_timeout))
            .keep_alive(true);
        builder.http2().max_concurrent_streams(250);
        if self.http2 {
            builder
        } else {
            builder.http1_only()
        }
    }

    async fn serve<I>(
        self: Arc<Self>,
        io: TokioIo<I>,
        remote_addr: SocketAddr,
        secure: bool,
        mut shutdown_rx: watch::Receiver<bool>,
    ) where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let ctx = Arc::clone(&self);
        let service = service_fn(move |req| {
            let ctx = Arc::clone(&ctx);
            async move { ctx.handle_request(req, remote_addr, secure).await }
        });

        let builder = self.builder();

        // In-flight requests finish; the connection then closes (GOAWAY on HTTP/2).
        let result = if self.handle_upgrades {
            let conn = builder.serve_connection_with_upgrades(io, service);
            tokio::pin!(conn);
            let mut draining = false;
            loop {
                tokio::select! {
                    res = conn.as_mut() => break res,
                    _ = shutdown_rx.changed(), if !draining => {
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }
        } else {
            let conn = builder.serve_connection(io, service);
            tokio::pin!(conn);
            let mut draining = false;
            loop {
                tokio::select! {
                    res = conn.as_mut() => break res,
                    _ = shutdown_rx.changed(), if !draining => {
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }
        };

        if let Err(err) = result {
            let err_str = format!("{:?}", err);
            if !is_connection_error(&err_str) {
                debug!(peer = %remote_addr, "connection error: {:?}", err);
            }
        }
    }

    async fn handle_request(
        &self,
        req: hyper::Request<IncomingBody>,
        remote_addr: SocketAddr,
        secure: bool,
    ) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
        let (parts, body) = req.into_parts();

        let collected = Limited::new(body, self.max_body_size).collect().await;
        let mut request = match collected {
            Ok(c) => Request::new(parts.method, parts.uri, parts.headers, c.to_bytes())
                .with_http_extensions(parts.extensions),
            Err(e) => {
                let err = if e.downcast_ref::<LengthLimitError>().is_some() {
                    HttpError::new(
                        HttpErrorKind::RequestEntityTooLarge,
                        format!("Request body size exceeds {}", self.max_body_size),
                    )
                } else {
                    HttpError::new(HttpErrorKind::BadRequest, "request body could not be read")
                };
                let request = Request::new(parts.method, parts.uri, parts.headers, Bytes::new())
                    .with_client_ip(remote_addr.ip())
                    .with_secure(secure);
                return Ok(self.dispatcher.reject(&request, err).map(Full::new));
            }
        };
        request = request.with_client_ip(remote_addr.ip()).with_secure(secure);
        request.set_version(parts.version);

        let response = self.dispatcher.dispatch(request).await;
        Ok(response.map(Full::new))
    }
}
