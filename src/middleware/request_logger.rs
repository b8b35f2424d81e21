//! Per-request logger.

use async_trait::async_trait;

use crate::core::{Request, Response};

use super::{HandlerResult, Next, RequestHandler};

/// Request logger options.
#[derive(Clone, Debug, Default)]
pub struct RequestLoggerOptions {
    /// Extra headers to record on the request span.
    pub headers: Vec<String>,
}

/// Replaces `req.log` with a span carrying `req_id` and logs the request line.
pub struct RequestLogger {
    options: RequestLoggerOptions,
}

#[async_trait]
impl RequestHandler for RequestLogger {
    fn name(&self) -> &str {
        "request_logger"
    }

    async fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        let span = tracing::info_span!(
            parent: &req.log,
            "request",
            req_id = %req.id(),
            method = %req.method(),
            path = %req.path(),
        );

        for name in &self.options.headers {
            if let Some(value) = req.header(name) {
                span.in_scope(|| tracing::debug!(header = %name, value = value, "request header"));
            }
        }

        span.in_scope(|| {
            tracing::debug!(
                url = %req.href(),
                ip = %req.client_ip(),
                ua = req.user_agent(),
                "incoming request"
            )
        });
        req.log = span;
        Ok(Next::Continue)
    }
}

/// Create the request logger.
pub fn request_logger(options: RequestLoggerOptions) -> RequestLogger {
    RequestLogger { options }
}
