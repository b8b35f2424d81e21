//! Server options.
//!
//! ```rust,ignore
//! use tokio_rest::server::{create_server, ServerOptions};
//!
//! let server = create_server(
//!     ServerOptions::new("inventory")
//!         .with_version("1.2.0")
//!         .with_tls("cert.pem", "key.pem"),
//! )?;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::formatters::Formatters;
use crate::middleware::{CorsOptions, ResponseHeadersHook};
use crate::router::{Router, RouterError};

/// Default limit for buffered request bodies (16 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Formats the elapsed handling time for the response time header.
pub type ResponseTimeFormatter = Arc<dyn Fn(Duration) -> String + Send + Sync>;

/// Errors raised while creating or running a server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("server is already listening on {0}")]
    AlreadyListening(std::net::SocketAddr),
}

/// Options for [`create_server`](super::create_server).
#[derive(Clone)]
pub struct ServerOptions {
    /// Name reported in the `Server` header and logs.
    pub name: String,
    /// Default versions for routes that declare none.
    pub version: Vec<String>,
    /// PEM certificate chain; TLS is enabled when both this and `key` are set.
    pub certificate: Option<PathBuf>,
    /// PEM private key.
    pub key: Option<PathBuf>,
    pub formatters: Formatters,
    /// Offer HTTP/2 (ALPN `h2` over TLS, prior knowledge in clear text).
    pub http2: bool,
    /// Header carrying the handling time; `None` disables it.
    pub response_time_header: Option<String>,
    pub response_time_formatter: ResponseTimeFormatter,
    /// Route requests carrying `Upgrade` like any other request.
    pub handle_upgrades: bool,
    /// Use a preconfigured router instead of an empty one.
    pub router: Option<Router>,
    pub strict_routing: bool,
    pub max_body_size: usize,
    /// Media types the server can produce; defaults to the formatter types.
    pub acceptable: Option<Vec<String>>,
    /// Replaces the default response header hook.
    pub response_headers: Option<ResponseHeadersHook>,
    /// Answer CORS preflight requests with these options.
    pub cors: Option<CorsOptions>,
    /// Accept loops; 0 uses the number of CPUs.
    pub workers: usize,
    /// Time `close()` waits for in-flight connections.
    pub drain_timeout: Duration,
    /// HTTP/1 header read timeout.
    pub header_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            name: "tokio_rest".to_string(),
            version: Vec::new(),
            certificate: None,
            key: None,
            formatters: Formatters::default(),
            http2: true,
            response_time_header: Some("X-Response-Time".to_string()),
            response_time_formatter: Arc::new(|d: Duration| d.as_millis().to_string()),
            handle_upgrades: false,
            router: None,
            strict_routing: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            acceptable: None,
            response_headers: None,
            cors: None,
            workers: 0,
            drain_timeout: Duration::from_secs(30),
            header_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version.push(version.into());
        self
    }

    pub fn with_tls(mut self, certificate: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.certificate = Some(certificate.into());
        self.key = Some(key.into());
        self
    }

    pub fn with_formatters(mut self, formatters: Formatters) -> Self {
        self.formatters = formatters;
        self
    }

    pub fn with_http2(mut self, enabled: bool) -> Self {
        self.http2 = enabled;
        self
    }

    pub fn with_response_time_header(mut self, header: Option<&str>) -> Self {
        self.response_time_header = header.map(str::to_string);
        self
    }

    pub fn with_response_time_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(Duration) -> String + Send + Sync + 'static,
    {
        self.response_time_formatter = Arc::new(formatter);
        self
    }

    pub fn with_handle_upgrades(mut self, enabled: bool) -> Self {
        self.handle_upgrades = enabled;
        self
    }

    pub fn with_router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_strict_routing(mut self, strict: bool) -> Self {
        self.strict_routing = strict;
        self
    }

    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn with_acceptable<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acceptable = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_response_headers(mut self, hook: ResponseHeadersHook) -> Self {
        self.response_headers = Some(hook);
        self
    }

    pub fn with_cors(mut self, cors: CorsOptions) -> Self {
        self.cors = Some(cors);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// True when both certificate and key are configured.
    #[inline]
    pub fn has_tls(&self) -> bool {
        self.certificate.is_some() && self.key.is_some()
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("certificate", &self.certificate)
            .field("key", &self.key)
            .field("formatters", &self.formatters.types())
            .field("http2", &self.http2)
            .field("response_time_header", &self.response_time_header)
            .field("handle_upgrades", &self.handle_upgrades)
            .field("strict_routing", &self.strict_routing)
            .field("max_body_size", &self.max_body_size)
            .field("acceptable", &self.acceptable)
            .field("cors", &self.cors)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}
