//! Conditional request checks.
//!
//! Compares `If-Match`, `If-None-Match`, `If-Modified-Since` and
//! `If-Unmodified-Since` against the `ETag` / `Last-Modified` a previous
//! handler set on the response.

use async_trait::async_trait;
use http::{Method, StatusCode};

use crate::core::{parse_http_date, Request, Response};
use crate::errors::{HttpError, RestErrorKind};

use super::chain::HandlerChain;
use super::{HandlerResult, Next, RequestHandler};

/// Outcome of evaluating preconditions.
#[derive(Debug)]
pub enum Precondition {
    Pass,
    NotModified,
    Failed(HttpError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Check {
    IfMatch,
    IfNoneMatch,
    IfModifiedSince,
    IfUnmodifiedSince,
}

impl Check {
    const ALL: [Check; 4] = [
        Check::IfMatch,
        Check::IfNoneMatch,
        Check::IfModifiedSince,
        Check::IfUnmodifiedSince,
    ];

    fn name(self) -> &'static str {
        match self {
            Check::IfMatch => "if_match",
            Check::IfNoneMatch => "if_none_match",
            Check::IfModifiedSince => "if_modified_since",
            Check::IfUnmodifiedSince => "if_unmodified_since",
        }
    }
}

fn strip_weak(tag: &str) -> &str {
    tag.trim().trim_start_matches("W/")
}

/// True when any entry of a comma-separated tag list matches `etag` (or is `*`).
fn tag_list_matches(list: &str, etag: Option<&str>) -> bool {
    list.split(',').map(str::trim).any(|t| {
        t == "*" || etag.map(|e| strip_weak(t) == strip_weak(e)).unwrap_or(false)
    })
}

fn precondition_failed(message: String) -> Precondition {
    Precondition::Failed(HttpError::new(RestErrorKind::PreconditionFailed, message))
}

fn is_read(req: &Request) -> bool {
    req.method() == Method::GET || req.method() == Method::HEAD
}

fn run_check(check: Check, req: &Request, res: &Response) -> Precondition {
    match check {
        Check::IfMatch => {
            let Some(header) = req.header("if-match") else {
                return Precondition::Pass;
            };
            if tag_list_matches(header, res.etag()) {
                Precondition::Pass
            } else {
                precondition_failed(format!(
                    "{} does not match If-Match {}",
                    res.etag().unwrap_or("no etag"),
                    header
                ))
            }
        }
        Check::IfNoneMatch => {
            let Some(header) = req.header("if-none-match") else {
                return Precondition::Pass;
            };
            if !tag_list_matches(header, res.etag()) {
                return Precondition::Pass;
            }
            if is_read(req) {
                Precondition::NotModified
            } else {
                precondition_failed(format!("{} matched If-None-Match", header))
            }
        }
        Check::IfModifiedSince => {
            // If-None-Match takes precedence
            if req.header("if-none-match").is_some() || !is_read(req) {
                return Precondition::Pass;
            }
            let since = req.header("if-modified-since").and_then(parse_http_date);
            match (since, res.last_modified()) {
                (Some(since), Some(modified)) if modified <= since => Precondition::NotModified,
                _ => Precondition::Pass,
            }
        }
        Check::IfUnmodifiedSince => {
            let Some(header) = req.header("if-unmodified-since") else {
                return Precondition::Pass;
            };
            match (parse_http_date(header), res.last_modified()) {
                (Some(since), Some(modified)) if modified > since => {
                    precondition_failed(format!("{} modified since {}", req.path(), header))
                }
                _ => Precondition::Pass,
            }
        }
    }
}

/// Evaluate all preconditions in order.
pub fn evaluate(req: &Request, res: &Response) -> Precondition {
    for check in Check::ALL {
        match run_check(check, req, res) {
            Precondition::Pass => continue,
            other => return other,
        }
    }
    Precondition::Pass
}

/// One precondition check.
pub struct ConditionalCheck {
    check: Check,
}

#[async_trait]
impl RequestHandler for ConditionalCheck {
    fn name(&self) -> &str {
        self.check.name()
    }

    async fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        match run_check(self.check, req, res) {
            Precondition::Pass => Ok(Next::Continue),
            Precondition::NotModified => {
                res.send_status(StatusCode::NOT_MODIFIED, ());
                Ok(Next::Stop)
            }
            Precondition::Failed(err) => Err(err),
        }
    }
}

/// The four precondition checks, in order.
pub fn conditional_request() -> HandlerChain {
    Check::ALL
        .into_iter()
        .fold(HandlerChain::new(), |chain, check| {
            chain.with(ConditionalCheck { check })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn request(method: &str, headers: &[(&str, &str)]) -> Request {
        let mut builder = http::Request::builder().method(method).uri("/res");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        Request::from(builder.body(bytes::Bytes::new()).unwrap())
    }

    fn response() -> Response {
        let mut res = Response::default();
        res.set_etag("v1");
        res.set_last_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        res
    }

    #[test]
    fn test_chain_has_four_checks() {
        assert_eq!(
            conditional_request().names(),
            vec!["if_match", "if_none_match", "if_modified_since", "if_unmodified_since"]
        );
    }

    #[test]
    fn test_if_none_match_get_is_not_modified() {
        let req = request("GET", &[("if-none-match", "\"v0\", \"v1\"")]);
        assert!(matches!(evaluate(&req, &response()), Precondition::NotModified));
    }

    #[test]
    fn test_if_none_match_put_fails() {
        let req = request("PUT", &[("if-none-match", "*")]);
        match evaluate(&req, &response()) {
            Precondition::Failed(err) => assert_eq!(err.status().as_u16(), 412),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_if_match() {
        let req = request("PUT", &[("if-match", "\"v1\"")]);
        assert!(matches!(evaluate(&req, &response()), Precondition::Pass));

        let req = request("PUT", &[("if-match", "\"v2\"")]);
        assert!(matches!(evaluate(&req, &response()), Precondition::Failed(_)));
    }

    #[test]
    fn test_weak_tags_compare_equal() {
        let req = request("GET", &[("if-none-match", "W/\"v1\"")]);
        assert!(matches!(evaluate(&req, &response()), Precondition::NotModified));
    }

    #[test]
    fn test_if_modified_since() {
        let later = crate::core::http_date(SystemTime::UNIX_EPOCH + Duration::from_secs(1_800_000_000));
        let req = request("GET", &[("if-modified-since", &later)]);
        assert!(matches!(evaluate(&req, &response()), Precondition::NotModified));

        let earlier = crate::core::http_date(SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000));
        let req = request("GET", &[("if-modified-since", &earlier)]);
        assert!(matches!(evaluate(&req, &response()), Precondition::Pass));
    }

    #[test]
    fn test_if_unmodified_since() {
        let earlier = crate::core::http_date(SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000));
        let req = request("DELETE", &[("if-unmodified-since", &earlier)]);
        match evaluate(&req, &response()) {
            Precondition::Failed(err) => assert!(err.is(RestErrorKind::PreconditionFailed)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_sends_not_modified() {
        let chain = conditional_request();
        let mut req = request("GET", &[("if-none-match", "\"v1\"")]);
        let mut res = response();
        let outcome = chain.run(&mut req, &mut res).await;
        assert!(matches!(outcome.result, Ok(Next::Stop)));
        assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
    }
}
