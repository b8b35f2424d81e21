//! Standard response headers.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use base64::Engine as _;
use md5::{Digest, Md5};

use crate::core::{http_date, Request, Response};

use super::{HandlerResult, Next, RequestHandler};

/// Hook applied to every response right before it is written.
pub type ResponseHeadersHook = Arc<dyn Fn(&Request, &mut Response) + Send + Sync>;

/// Header set by the default hook on every response.
pub const SERVER_HEADER: &str = "server";

/// The hook the server installs unless `ServerOptions` replaces it.
///
/// Sets `Server`, `Request-Id` and `Date` when a handler did not.
pub fn default_response_headers(server_name: impl Into<String>) -> ResponseHeadersHook {
    let server_name = server_name.into();
    Arc::new(move |_req: &Request, res: &mut Response| {
        if !res.has_header(SERVER_HEADER) {
            res.header(SERVER_HEADER, &server_name);
        }
        if !res.has_header("request-id") {
            let id = res.id().to_string();
            res.header("request-id", id);
        }
        if !res.has_header("date") {
            res.header("date", http_date(SystemTime::now()));
        }
    })
}

fn connection_value(req: &Request) -> &'static str {
    match req.header("connection") {
        Some(v) if v.eq_ignore_ascii_case("close") => "close",
        _ if req.version() == http::Version::HTTP_10 => "close",
        _ => "keep-alive",
    }
}

/// Adds the full set of informational headers once the body is formatted.
pub struct FullResponse;

#[async_trait]
impl RequestHandler for FullResponse {
    fn name(&self) -> &str {
        "full_response"
    }

    async fn handle(&self, _req: &mut Request, _res: &mut Response) -> HandlerResult {
        Ok(Next::Continue)
    }

    fn on_response(&self, req: &Request, res: &mut Response) {
        res.header("date", http_date(SystemTime::now()));
        let id = res.id().to_string();
        res.header("request-id", id);
        res.header("response-time", format!("{}", req.elapsed().as_millis()));
        if !res.has_header("api-version") && req.api_version() != "*" {
            res.header("api-version", req.api_version());
        }
        if req.version() < http::Version::HTTP_2 {
            res.header("connection", connection_value(req));
        }

        let len = res.body_len();
        if len > 0 {
            let digest = res
                .body()
                .map(|b| base64::engine::general_purpose::STANDARD.encode(Md5::digest(b)));
            if let Some(digest) = digest {
                res.header("content-md5", digest);
            }
        }
        if !res.has_header("content-length") {
            res.header("content-length", len.to_string());
        }
    }
}

/// Create the full response handler.
pub fn full_response() -> FullResponse {
    FullResponse
}
