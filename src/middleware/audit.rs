//! Audit logging.
//!
//! Emits one structured event per completed request with target `audit`,
//! which the JSON log formatter tags as `"type":"audit"`.

use crate::core::{Request, Response};
use crate::errors::HttpError;
use crate::router::Route;

use super::AfterHandler;

/// Audit logger configuration.
#[derive(Clone, Debug)]
pub struct AuditOptions {
    /// Whether logging is enabled.
    pub enabled: bool,
    /// Include request and response bodies (truncated).
    pub body: bool,
    /// Truncate logged bodies to this many bytes.
    pub max_body_log: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            body: false,
            max_body_log: 1024,
        }
    }
}

/// After-hook that writes an audit record.
pub struct AuditLogger {
    options: AuditOptions,
}

fn truncated(bytes: &[u8], max: usize) -> String {
    let cut = &bytes[..bytes.len().min(max)];
    String::from_utf8_lossy(cut).into_owned()
}

impl AfterHandler for AuditLogger {
    fn after(&self, req: &Request, res: &Response, route: Option<&Route>, err: Option<&HttpError>) {
        if !self.options.enabled {
            return;
        }

        let status = res.code();
        let latency_ms = req.elapsed_ms();
        let route_name = route.map(|r| r.name.as_str());
        let (req_body, res_body) = if self.options.body {
            (
                Some(truncated(req.raw_body(), self.options.max_body_log)),
                res.body()
                    .map(|b| truncated(b, self.options.max_body_log)),
            )
        } else {
            (None, None)
        };

        let error = err.map(|e| e.to_string());

        tracing::info!(
            target: "audit",
            req_id = %req.id(),
            method = %req.method(),
            url = %req.href(),
            ip = %req.client_ip(),
            ua = req.user_agent(),
            username = req.username.as_deref(),
            accept_version = req.api_version(),
            route = route_name,
            status = status,
            bytes = res.body_len() as u64,
            latency_ms = latency_ms,
            error = error.as_deref(),
            req_body = req_body.as_deref(),
            res_body = res_body.as_deref(),
            secure = req.is_secure(),
            "handled: {}",
            status
        );
    }
}

/// Create the audit logger.
pub fn audit_logger(options: AuditOptions) -> AuditLogger {
    AuditLogger { options }
}
