//! JSONP support.

use async_trait::async_trait;

use crate::core::{Request, Response};
use crate::formatters::{APPLICATION_JAVASCRIPT, JSONP_CALLBACK};

use super::query::parse_query;
use super::{HandlerResult, Next, RequestHandler};

/// Switches the response to the JSONP formatter when `callback` or `jsonp`
/// is present in the query.
pub struct Jsonp;

/// Keep only characters valid in a JavaScript member expression.
fn sanitize(callback: &str) -> String {
    callback
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']'))
        .collect()
}

#[async_trait]
impl RequestHandler for Jsonp {
    fn name(&self) -> &str {
        "jsonp"
    }

    async fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        let query = if req.query.is_empty() {
            req.query_string().map(parse_query).unwrap_or_default()
        } else {
            req.query.clone()
        };

        let callback = ["callback", "jsonp"]
            .iter()
            .find_map(|k| query.get(*k).and_then(|v| v.as_str()))
            .map(sanitize)
            .filter(|cb| !cb.is_empty());

        if let Some(cb) = callback {
            req.set(JSONP_CALLBACK, cb);
            res.set_content_type(APPLICATION_JAVASCRIPT);
        }
        Ok(Next::Continue)
    }
}

/// Create the JSONP handler.
pub fn jsonp() -> Jsonp {
    Jsonp
}
