//! `Date` header freshness check.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::core::{parse_http_date, Request, Response};
use crate::errors::{HttpError, RestErrorKind};

use super::{HandlerResult, Next, RequestHandler};

/// Default allowed clock skew.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Rejects requests whose `Date` (or `x-date`) is older than the allowed skew.
pub struct DateParser {
    skew: Duration,
}

#[async_trait]
impl RequestHandler for DateParser {
    fn name(&self) -> &str {
        "date_parser"
    }

    async fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        let Some(value) = req.header("x-date").or_else(|| req.header("date")) else {
            return Ok(Next::Continue);
        };

        let date = parse_http_date(value).ok_or_else(|| {
            HttpError::new(
                RestErrorKind::InvalidHeader,
                format!("Date header {} is invalid", value),
            )
        })?;

        // only stale dates expire; a client clock running ahead is accepted
        let age = (Utc::now() - date).num_milliseconds();
        if age > self.skew.as_millis() as i64 {
            tracing::debug!(date = value, age_ms = age, "request date older than clock skew");
            return Err(HttpError::new(
                RestErrorKind::RequestExpired,
                format!("Date header {} is too old", value),
            ));
        }
        Ok(Next::Continue)
    }
}

/// Create a date parser; `skew` defaults to five minutes.
pub fn date_parser(skew: Option<Duration>) -> DateParser {
    DateParser {
        skew: skew.unwrap_or(DEFAULT_CLOCK_SKEW),
    }
}
