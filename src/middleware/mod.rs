//! Handler contract and the built-in plugin catalog.
//!
//! Every handler, whether a route handler or a plugin, implements
//! [`RequestHandler`]. Handlers run in registration order; each returns a
//! [`Next`] telling the server whether to continue, or an error that becomes
//! the response.
//!
//! # Lifecycle
//!
//! ```text
//! Request → pre chain → router → H1.handle → H2.handle → ... → Hn.handle
//!                                                                  ↓
//! Response ← after hooks ← formatter ← H1.on_response ← ... ← Hn.on_response
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_rest::middleware::{HandlerResult, Next, RequestHandler};
//! use tokio_rest::core::{Request, Response};
//!
//! struct RequireJson;
//!
//! #[async_trait::async_trait]
//! impl RequestHandler for RequireJson {
//!     fn name(&self) -> &str { "require_json" }
//!
//!     async fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
//!         if !req.is("json") {
//!             res.send_status(http::StatusCode::BAD_REQUEST, "json only");
//!             return Ok(Next::Stop);
//!         }
//!         Ok(Next::Continue)
//!     }
//! }
//! ```

mod chain;

pub mod accept;
pub mod audit;
pub mod authorization;
pub mod body;
pub mod conditional;
pub mod cors;
pub mod date;
pub mod gzip;
pub mod headers;
pub mod jsonp;
pub mod pre;
pub mod query;
pub mod request_logger;
pub mod static_files;
pub mod throttle;

pub use chain::{ChainOutcome, HandlerChain, IntoChain};

pub use accept::accept_parser;
pub use audit::{audit_logger, AuditLogger, AuditOptions};
pub use authorization::authorization_parser;
pub use body::{body_parser, json_body_parser, url_encoded_body_parser, BodyParserOptions};
pub use conditional::conditional_request;
pub use cors::{cors, CorsOptions, CORS_ALLOW_HEADERS};
pub use date::date_parser;
pub use gzip::{gzip_response, GzipOptions};
pub use headers::{default_response_headers, full_response, ResponseHeadersHook};
pub use jsonp::jsonp;
pub use query::{query_parser, QueryParserOptions};
pub use request_logger::{request_logger, RequestLoggerOptions};
pub use static_files::{serve_static, StaticOptions};
pub use throttle::{throttle, ThrottleOptions, ThrottleOverride};

use async_trait::async_trait;

use crate::core::{Request, Response};
use crate::errors::HttpError;
use crate::router::Route;

/// What the chain does after a handler returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Next {
    /// Run the next handler.
    Continue,
    /// End the chain; the response is sent as it stands.
    Stop,
}

impl Next {
    /// Turn an optional error into an early return.
    ///
    /// ```rust,ignore
    /// Next::if_error(maybe_err)?;
    /// ```
    pub fn if_error<E: Into<HttpError>>(err: Option<E>) -> Result<(), HttpError> {
        match err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    #[inline]
    pub fn is_continue(self) -> bool {
        self == Next::Continue
    }
}

/// Result of a handler.
pub type HandlerResult = Result<Next, HttpError>;

/// A request handler.
///
/// Plain closures `Fn(&mut Request, &mut Response) -> HandlerResult` are
/// handlers too.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "handler"
    }

    /// Process the request.
    async fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult;

    /// Adjust the response once the chain finished.
    ///
    /// Called in reverse order for handlers that ran.
    fn on_response(&self, _req: &Request, _res: &mut Response) {}
}

#[async_trait]
impl<F> RequestHandler for F
where
    F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync,
{
    async fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        (self)(req, res)
    }
}

/// Hook run after the response was built (the `after` event).
pub trait AfterHandler: Send + Sync {
    fn after(
        &self,
        req: &Request,
        res: &Response,
        route: Option<&Route>,
        err: Option<&HttpError>,
    );
}

impl<F> AfterHandler for F
where
    F: Fn(&Request, &Response, Option<&Route>, Option<&HttpError>) + Send + Sync,
{
    fn after(
        &self,
        req: &Request,
        res: &Response,
        route: Option<&Route>,
        err: Option<&HttpError>,
    ) {
        (self)(req, res, route, err)
    }
}
