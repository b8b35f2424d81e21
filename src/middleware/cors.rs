//! Cross-origin resource sharing.
//!
//! `cors()` decorates simple requests; preflight `OPTIONS` requests without a
//! route are answered by the server through [`preflight`].

use async_trait::async_trait;

use crate::core::{Request, Response};

use super::{HandlerResult, Next, RequestHandler};

/// Request headers allowed on cross-origin requests.
pub const CORS_ALLOW_HEADERS: &[&str] = &[
    "accept",
    "accept-version",
    "content-type",
    "request-id",
    "origin",
    "x-api-version",
    "x-request-id",
];

/// Response headers exposed to cross-origin callers.
pub const CORS_EXPOSE_HEADERS: &[&str] = &[
    "api-version",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "request-id",
    "response-time",
];

const PREFLIGHT_MAX_AGE: u32 = 3600;

#[derive(Clone, Debug)]
pub struct CorsOptions {
    /// Allowed origins; `*` allows any.
    pub origins: Vec<String>,
    /// Send `Access-Control-Allow-Credentials: true`.
    pub credentials: bool,
    /// Extra headers appended to the allow and expose lists.
    pub headers: Vec<String>,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            origins: vec!["*".to_string()],
            credentials: false,
            headers: Vec::new(),
        }
    }
}

impl CorsOptions {
    fn origin_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == "*" || o.eq_ignore_ascii_case(origin))
    }

    fn allow_origin_value<'a>(&'a self, origin: &'a str) -> &'a str {
        // a wildcard cannot be combined with credentials
        if !self.credentials && self.origins.iter().any(|o| o == "*") {
            "*"
        } else {
            origin
        }
    }

    fn list(&self, base: &[&str]) -> String {
        base.iter()
            .copied()
            .chain(self.headers.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// CORS handler for simple (non-preflight) requests.
pub struct Cors {
    options: CorsOptions,
}

#[async_trait]
impl RequestHandler for Cors {
    fn name(&self) -> &str {
        "cors"
    }

    async fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        let Some(origin) = req.header("origin") else {
            return Ok(Next::Continue);
        };
        if !self.options.origin_allowed(origin) {
            tracing::debug!(origin = origin, "origin not allowed");
            return Ok(Next::Continue);
        }

        res.header(
            "access-control-allow-origin",
            self.options.allow_origin_value(origin),
        );
        if self.options.credentials {
            res.header("access-control-allow-credentials", "true");
        }
        res.header(
            "access-control-expose-headers",
            self.options.list(CORS_EXPOSE_HEADERS),
        );
        res.append_header("vary", "Origin");
        Ok(Next::Continue)
    }
}

/// Create the CORS handler.
pub fn cors(options: CorsOptions) -> Cors {
    Cors { options }
}

/// True for an `OPTIONS` request announcing a cross-origin method.
pub fn is_preflight(req: &Request) -> bool {
    req.method() == http::Method::OPTIONS
        && req.header("origin").is_some()
        && req.header("access-control-request-method").is_some()
}

/// Answer a preflight request. `allow` is the comma-separated method list.
///
/// Returns false when the origin is not allowed; the caller still replies
/// with `Allow`, just without CORS headers.
pub fn preflight(options: &CorsOptions, req: &Request, res: &mut Response, allow: &str) -> bool {
    let Some(origin) = req.header("origin") else {
        return false;
    };
    if !options.origin_allowed(origin) {
        return false;
    }

    res.header("access-control-allow-origin", options.allow_origin_value(origin));
    if options.credentials {
        res.header("access-control-allow-credentials", "true");
    }

    let mut allow_headers = options.list(CORS_ALLOW_HEADERS);
    if let Some(requested) = req.header("access-control-request-headers") {
        allow_headers.push_str(", ");
        allow_headers.push_str(requested);
    }
    res.header("access-control-allow-headers", allow_headers);
    res.header("access-control-allow-methods", allow);
    res.header("access-control-max-age", PREFLIGHT_MAX_AGE.to_string());
    res.append_header("vary", "Origin");
    true
}
