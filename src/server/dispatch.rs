//! Request dispatch.
//!
//! ```text
//! Request → pre chain → Router::find → route chain
//!                                          ↓
//! hyper ← after hooks ← default headers ← on_response (reverse) ← formatter
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use http::{Method, StatusCode};

use super::options::ResponseTimeFormatter;
use crate::core::{Request, Response};
use crate::errors::{HttpError, HttpErrorKind};
use crate::formatters::{format_or_fail, Formatters};
use crate::middleware::cors::{is_preflight, preflight};
use crate::middleware::{AfterHandler, CorsOptions, HandlerChain, Next, ResponseHeadersHook};
use crate::router::version::VersionRange;
use crate::router::{Route, Router};

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// State shared by the server handle and every connection.
pub(crate) struct Dispatcher {
    pub name: String,
    pub formatters: Formatters,
    pub router: RwLock<Router>,
    pub pre: RwLock<HandlerChain>,
    /// Handlers registered with `use_handler`; copied into routes mounted later.
    pub chain: RwLock<HandlerChain>,
    /// Full handler chain per route name.
    pub routes: RwLock<HashMap<String, HandlerChain>>,
    pub after: RwLock<Vec<Arc<dyn AfterHandler>>>,
    pub response_headers: ResponseHeadersHook,
    pub response_time_header: Option<String>,
    pub response_time_formatter: ResponseTimeFormatter,
    pub handle_upgrades: bool,
    pub cors: Option<CorsOptions>,
}

fn is_upgrade(req: &Request) -> bool {
    let connection_upgrade = req
        .header("connection")
        .map(|c| c.split(',').any(|t| t.trim().eq_ignore_ascii_case("upgrade")))
        .unwrap_or(false);
    // h2c upgrades are ignored by the HTTP/1 connection and served normally
    connection_upgrade
        && req
            .header("upgrade")
            .map(|u| !u.eq_ignore_ascii_case("h2c"))
            .unwrap_or(false)
}

impl Dispatcher {
    /// Run the full request lifecycle and build the wire response.
    pub async fn dispatch(&self, mut req: Request) -> http::Response<Bytes> {
        let mut res = Response::new(req.id());
        let is_head = req.method() == Method::HEAD;

        let mut error: Option<HttpError> = None;
        let mut route: Option<Arc<Route>> = None;
        let mut ran: Vec<(HandlerChain, usize)> = Vec::with_capacity(2);

        let pre = read(&self.pre).clone();
        let outcome = pre.run(&mut req, &mut res).await;
        ran.push((pre, outcome.ran));

        match outcome.result {
            Err(e) => error = Some(e),
            Ok(Next::Stop) => {}
            Ok(Next::Continue) => {
                if !self.handle_upgrades && is_upgrade(&req) {
                    let err = HttpError::new(
                        HttpErrorKind::NotImplemented,
                        "upgrade requests are not handled",
                    );
                    res.send_error(err.clone());
                    error = Some(err);
                } else {
                    self.route(&mut req, &mut res, &mut route, &mut error, &mut ran)
                        .await;
                }
            }
        }

        format_or_fail(&self.formatters, &req, &mut res);

        for (chain, count) in ran.iter().rev() {
            chain.respond(*count, &req, &mut res);
        }

        (self.response_headers)(&req, &mut res);
        if let Some(header) = &self.response_time_header {
            let took = (self.response_time_formatter)(req.elapsed());
            res.header(header, took);
        }

        let after = read(&self.after).clone();
        let err = error.as_ref().or(res.error());
        for hook in &after {
            hook.after(&req, &res, route.as_deref(), err);
        }

        tracing::debug!(
            server = %self.name,
            req_id = %req.id(),
            method = %req.method(),
            path = %req.path(),
            status = res.code(),
            route = route.as_ref().map(|r| r.name.as_str()),
            "request complete"
        );

        let mut out: http::Response<Bytes> = res.into();
        if is_head {
            *out.body_mut() = Bytes::new();
        }
        out
    }

    async fn route(
        &self,
        req: &mut Request,
        res: &mut Response,
        route: &mut Option<Arc<Route>>,
        error: &mut Option<HttpError>,
        ran: &mut Vec<(HandlerChain, usize)>,
    ) {
        let found = read(&self.router).find(req);
        let matched = match found {
            Ok(m) => m,
            Err(err) => {
                if req.method() == Method::OPTIONS && err.status() == StatusCode::METHOD_NOT_ALLOWED {
                    self.options_reply(req, res, &err);
                    return;
                }
                tracing::debug!(path = %req.path(), status = err.status().as_u16(), "no route");
                res.send_error(err.clone());
                *error = Some(err);
                return;
            }
        };

        for (k, v) in matched.params {
            req.params.insert(k, v);
        }
        req.set_route(matched.route.name.clone());

        if !matched.route.versions.is_empty() {
            let served = VersionRange::parse(req.api_version())
                .and_then(|r| r.max_satisfying(&matched.route.versions));
            if let Some(v) = served {
                res.header("api-version", v.to_string());
            }
        }

        let chain = read(&self.routes)
            .get(&matched.route.name)
            .cloned()
            .unwrap_or_default();
        *route = Some(Arc::clone(&matched.route));

        let outcome = chain.run(req, res).await;
        let count = outcome.ran;
        match outcome.result {
            Err(e) => *error = Some(e),
            Ok(Next::Continue) if !res.sent() => {
                tracing::warn!(
                    route = %matched.route.name,
                    req_id = %req.id(),
                    "handler chain finished without sending a response"
                );
            }
            Ok(_) => {}
        }
        ran.push((chain, count));
    }

    /// Answer with an error before any handler ran (unreadable or oversized body).
    pub fn reject(&self, req: &Request, err: HttpError) -> http::Response<Bytes> {
        tracing::debug!(req_id = %req.id(), status = err.status().as_u16(), error = %err, "request rejected");
        let mut res = Response::new(req.id());
        res.send_error(err);
        format_or_fail(&self.formatters, req, &mut res);
        (self.response_headers)(req, &mut res);
        res.into()
    }

    fn options_reply(&self, req: &Request, res: &mut Response, err: &HttpError) {
        let allow = err
            .headers()
            .get("allow")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if let Some(cors) = &self.cors {
            if is_preflight(req) && !preflight(cors, req, res, &allow) {
                tracing::debug!(origin = req.header("origin"), "preflight origin rejected");
            }
        }
        res.header("allow", &allow);
        res.send_status(StatusCode::OK, ());
    }
}
