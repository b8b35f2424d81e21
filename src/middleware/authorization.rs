//! `Authorization` header parsing.

use async_trait::async_trait;
use base64::Engine as _;

use crate::core::{Authorization, BasicAuth, Request, Response};
use crate::errors::{HttpError, RestErrorKind};

use super::{HandlerResult, Next, RequestHandler};

/// Username assigned when a request carries no credentials.
pub const ANONYMOUS: &str = "anonymous";

/// Parses `Authorization` into `req.authorization` and `req.username`.
pub struct AuthorizationParser;

fn parse_basic(credentials: &str) -> Result<BasicAuth, HttpError> {
    let invalid = || HttpError::new(RestErrorKind::InvalidHeader, "Basic auth content is invalid.");
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(credentials.trim())
        .map_err(|_| invalid())?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid())?;
    let (username, password) = decoded.split_once(':').ok_or_else(invalid)?;
    Ok(BasicAuth {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[async_trait]
impl RequestHandler for AuthorizationParser {
    fn name(&self) -> &str {
        "authorization_parser"
    }

    async fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        req.username = Some(ANONYMOUS.to_string());

        let Some(header) = req.header("authorization").map(str::to_string) else {
            req.authorization = None;
            return Ok(Next::Continue);
        };

        let mut pieces = header.splitn(2, ' ');
        let (scheme, credentials) = match (pieces.next(), pieces.next()) {
            (Some(s), Some(c)) if !s.is_empty() && !c.trim().is_empty() => (s, c.trim()),
            _ => {
                return Err(HttpError::new(
                    RestErrorKind::InvalidHeader,
                    "Authorization header is invalid.",
                ))
            }
        };

        let basic = if scheme.eq_ignore_ascii_case("basic") {
            let basic = parse_basic(credentials)?;
            req.username = Some(basic.username.clone());
            Some(basic)
        } else {
            None
        };

        req.authorization = Some(Authorization {
            scheme: scheme.to_string(),
            credentials: credentials.to_string(),
            basic,
        });
        Ok(Next::Continue)
    }
}

/// Create an authorization parser.
pub fn authorization_parser() -> AuthorizationParser {
    AuthorizationParser
}
