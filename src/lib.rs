//! tokio_rest - REST API framework powered by Tokio and hyper.
//!
//! Build HTTP services from verb-routed handler chains, with content
//! negotiation, semantic versioning of routes, typed REST errors and a
//! catalog of plugins. A matching client speaks the same error format.
//!
//! # Features
//!
//! - **HTTP/1.1 and HTTP/2**: ALPN negotiation over TLS
//! - **Routing**: `:param` and regex paths, `Accept-Version` aware
//! - **Formatters**: payloads serialized by `Accept` negotiation
//! - **Plugins**: body, query, throttle, gzip, static files, CORS, audit
//! - **Clients**: raw, text and JSON clients with retry
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_rest::core::{Request, Response};
//! use tokio_rest::middleware::{HandlerResult, Next};
//! use tokio_rest::server::{create_server, ServerOptions};
//!
//! let server = create_server(ServerOptions::new("echo"))?;
//! server.get("/echo/:name", |req: &mut Request, res: &mut Response| -> HandlerResult {
//!     res.send(serde_json::json!({ "name": req.params["name"] }));
//!     Ok(Next::Stop)
//! })?;
//! server.listen("127.0.0.1:8080".parse()?).await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod client;
pub mod config;
pub mod core;
pub mod errors;
pub mod formatters;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod server;

// Re-exports for convenience
pub use config::Config;
pub use core::{Request, Response};
pub use errors::{HttpError, HttpErrorKind, RestErrorKind};
pub use middleware::{HandlerResult, Next, RequestHandler};
pub use server::{create_server, Server, ServerOptions};
