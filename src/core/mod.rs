//! Core types for request handling.
//!
//! - [`Request`] - inbound request with parsed params, query, body and auth
//! - [`Response`] - outbound response holding an unserialized [`Payload`]
//! - [`negotiate`] - media type matching shared by formatters and plugins
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_rest::core::{Request, Response};
//! use tokio_rest::middleware::{HandlerResult, Next};
//!
//! fn hello(req: &mut Request, res: &mut Response) -> HandlerResult {
//!     let name = req.params.get("name").cloned().unwrap_or_default();
//!     res.send(format!("hello {}", name));
//!     Ok(Next::Continue)
//! }
//! ```

pub mod negotiate;
mod request;
mod response;

pub use request::{Authorization, BasicAuth, Request, RequestFile, DEFAULT_CONTENT_TYPE};
pub use response::{http_date, parse_http_date, CacheType, Payload, Response};
