//! Accept header check.

use async_trait::async_trait;

use crate::core::{Request, Response};
use crate::errors::{HttpError, HttpErrorKind};

use super::{HandlerResult, Next, RequestHandler};

/// Rejects requests whose `Accept` header matches none of the server's types.
pub struct AcceptParser {
    acceptable: Vec<String>,
}

#[async_trait]
impl RequestHandler for AcceptParser {
    fn name(&self) -> &str {
        "accept_parser"
    }

    async fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        if self.acceptable.iter().any(|t| req.accepts(t)) {
            return Ok(Next::Continue);
        }
        Err(HttpError::new(
            HttpErrorKind::NotAcceptable,
            format!("Server accepts: {}", self.acceptable.join(",")),
        ))
    }
}

/// Create an accept parser for the given media types (usually `server.acceptable()`).
pub fn accept_parser<I, S>(acceptable: I) -> AcceptParser
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    AcceptParser {
        acceptable: acceptable.into_iter().map(Into::into).collect(),
    }
}
