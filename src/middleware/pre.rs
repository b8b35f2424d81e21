//! Handlers meant for the pre-routing chain.

use std::sync::LazyLock;

use async_trait::async_trait;
use http::uri::PathAndQuery;
use http::{Method, Uri};
use regex::Regex;

use crate::core::{Request, Response};

use super::{HandlerResult, Next, RequestHandler};

/// Holds the body until a body reader takes it.
pub struct Pause;

#[async_trait]
impl RequestHandler for Pause {
    fn name(&self) -> &str {
        "pause"
    }

    async fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        req.hold_body();
        Ok(Next::Continue)
    }
}

pub fn pause() -> Pause {
    Pause
}

/// Collapse repeated slashes and drop a trailing slash (root stays `/`).
pub fn clean_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

fn rewrite_path(uri: &Uri, path: &str) -> Option<Uri> {
    let pq = match uri.query() {
        Some(q) => format!("{}?{}", path, q),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(pq.parse::<PathAndQuery>().ok()?);
    Uri::from_parts(parts).ok()
}

/// Rewrites `//a///b/` to `/a/b` before routing.
pub struct SanitizePath;

#[async_trait]
impl RequestHandler for SanitizePath {
    fn name(&self) -> &str {
        "sanitize_path"
    }

    async fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        let cleaned = clean_path(req.path());
        if cleaned != req.path() {
            match rewrite_path(req.uri(), &cleaned) {
                Some(uri) => {
                    tracing::trace!(from = req.path(), to = %cleaned, "sanitized path");
                    req.set_uri(uri);
                }
                None => tracing::debug!(path = req.path(), "could not rewrite path"),
            }
        }
        Ok(Next::Continue)
    }
}

pub fn sanitize_path() -> SanitizePath {
    SanitizePath
}

/// Options for [`user_agent_connection`].
#[derive(Clone, Debug)]
pub struct UserAgentOptions {
    pub user_agent_regexp: Regex,
}

static CURL: LazyLock<Regex> = LazyLock::new(|| Regex::new("^curl.+").expect("Invalid regex"));

impl Default for UserAgentOptions {
    fn default() -> Self {
        Self {
            user_agent_regexp: CURL.clone(),
        }
    }
}

/// Works around clients (curl) that wait for the socket to close after `HEAD`.
pub struct UserAgentConnection {
    options: UserAgentOptions,
}

impl UserAgentConnection {
    fn applies(&self, req: &Request) -> bool {
        req.user_agent()
            .map(|ua| self.options.user_agent_regexp.is_match(ua))
            .unwrap_or(false)
    }
}

#[async_trait]
impl RequestHandler for UserAgentConnection {
    fn name(&self) -> &str {
        "user_agent_connection"
    }

    async fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        if self.applies(req) {
            res.header("connection", "close");
        }
        Ok(Next::Continue)
    }

    fn on_response(&self, req: &Request, res: &mut Response) {
        if self.applies(req) && req.method() == Method::HEAD {
            res.remove_header("content-length");
        }
    }
}

pub fn user_agent_connection(options: UserAgentOptions) -> UserAgentConnection {
    UserAgentConnection { options }
}
