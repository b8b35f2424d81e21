//! HTTP response as handlers build it.
//!
//! Handlers set a [`Payload`] through `send`/`json`; the server serializes it
//! with the negotiated formatter once the chain finishes.

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::Value;

use crate::errors::HttpError;

/// Common header name constants for fast lookup.
mod header_names {
    use super::*;
    pub static CONTENT_TYPE: HeaderName = header::CONTENT_TYPE;
    pub static CONTENT_LENGTH: HeaderName = header::CONTENT_LENGTH;
    pub static CACHE_CONTROL: HeaderName = header::CACHE_CONTROL;
    pub static ETAG: HeaderName = header::ETAG;
    pub static LAST_MODIFIED: HeaderName = header::LAST_MODIFIED;
}

/// Unserialized response body.
#[derive(Clone, Debug, Default)]
pub enum Payload {
    #[default]
    Empty,
    Bytes(Bytes),
    Text(String),
    Json(Value),
    Error(HttpError),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Bytes(b) => b.is_empty(),
            Payload::Text(s) => s.is_empty(),
            Payload::Json(_) | Payload::Error(_) => false,
        }
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Json(v)
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(b))
    }
}

impl From<HttpError> for Payload {
    fn from(e: HttpError) -> Self {
        Payload::Error(e)
    }
}

/// `Cache-Control` visibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheType {
    #[default]
    Public,
    Private,
    NoCache,
    NoStore,
}

impl CacheType {
    fn directive(self) -> &'static str {
        match self {
            CacheType::Public => "public",
            CacheType::Private => "private",
            CacheType::NoCache => "no-cache",
            CacheType::NoStore => "no-store",
        }
    }
}

/// Format a timestamp as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(time: SystemTime) -> String {
    let dt: DateTime<Utc> = time.into();
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// HTTP response.
///
/// Note: Clone is intentionally not derived; handlers receive `&mut Response`.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    status_set: bool,
    headers: HeaderMap,
    payload: Payload,
    body: Option<Bytes>,
    sent: bool,
    id: String,
    char_set: Option<String>,
}

impl Response {
    /// Create an empty 200 response for a request id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            status_set: false,
            headers: HeaderMap::new(),
            payload: Payload::Empty,
            body: None,
            sent: false,
            id: id.into(),
            char_set: None,
        }
    }

    /// Id of the request this response answers.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Numeric status code.
    #[inline]
    pub fn code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Set the status code.
    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self.status_set = true;
        self
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing existing values. Invalid names or values are ignored.
    pub fn header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Append a header value, keeping existing ones.
    pub fn append_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Get a header value (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[inline]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(name);
    }

    /// Set `Cache-Control`; `max_age` defaults to one hour for cacheable types.
    pub fn cache(&mut self, cache_type: CacheType, max_age: Option<Duration>) -> &mut Self {
        let value = match cache_type {
            CacheType::Public | CacheType::Private => format!(
                "{}, max-age={}",
                cache_type.directive(),
                max_age.unwrap_or(Duration::from_secs(3600)).as_secs()
            ),
            _ => cache_type.directive().to_string(),
        };
        self.header(&header_names::CACHE_CONTROL, value)
    }

    /// Set the charset appended to the formatted content type.
    pub fn char_set(&mut self, char_set: impl Into<String>) -> &mut Self {
        self.char_set = Some(char_set.into());
        self
    }

    pub fn get_char_set(&self) -> Option<&str> {
        self.char_set.as_deref()
    }

    /// Set `Content-Type` (shorthand like `json` allowed).
    pub fn set_content_type(&mut self, media_type: &str) -> &mut Self {
        let full = super::negotiate::normalize_type(media_type).into_owned();
        self.header(&header_names::CONTENT_TYPE, full)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(&header_names::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// `Content-Length` if set, else the formatted body length.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(&header_names::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .or_else(|| self.body.as_ref().map(|b| b.len() as u64))
    }

    /// Set a strong `ETag` (quotes added when missing).
    pub fn set_etag(&mut self, tag: &str) -> &mut Self {
        let value = if tag.starts_with('"') || tag.starts_with("W/") {
            tag.to_string()
        } else {
            format!("\"{}\"", tag)
        };
        self.header(&header_names::ETAG, value)
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers
            .get(&header_names::ETAG)
            .and_then(|v| v.to_str().ok())
    }

    pub fn set_last_modified(&mut self, time: SystemTime) -> &mut Self {
        self.header(&header_names::LAST_MODIFIED, http_date(time))
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.headers
            .get(&header_names::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
    }

    /// Send a payload with the current status (errors use their own status).
    pub fn send(&mut self, payload: impl Into<Payload>) -> &mut Self {
        let payload = payload.into();
        if let Payload::Error(err) = &payload {
            self.status = err.status();
            self.status_set = true;
            for (name, value) in err.headers() {
                self.headers.insert(name.clone(), value.clone());
            }
        }
        self.payload = payload;
        self.body = None;
        self.sent = true;
        self
    }

    /// Send a payload with a status.
    pub fn send_status(&mut self, status: StatusCode, payload: impl Into<Payload>) -> &mut Self {
        self.set_status(status);
        self.send(payload)
    }

    /// Send a payload with a status and extra headers.
    pub fn send_with_headers<I, K, V>(
        &mut self,
        status: StatusCode,
        payload: impl Into<Payload>,
        headers: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (k, v) in headers {
            self.header(k, v);
        }
        self.send_status(status, payload)
    }

    /// Send a JSON value with a status.
    pub fn json(&mut self, status: StatusCode, value: Value) -> &mut Self {
        self.send_status(status, Payload::Json(value))
    }

    /// Send an error as the response.
    pub fn send_error(&mut self, err: HttpError) -> &mut Self {
        self.send(Payload::Error(err))
    }

    /// True once a handler sent a payload.
    #[inline]
    pub fn sent(&self) -> bool {
        self.sent
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn take_payload(&mut self) -> Payload {
        std::mem::take(&mut self.payload)
    }

    /// Error sent through the response, if any.
    pub fn error(&self) -> Option<&HttpError> {
        match &self.payload {
            Payload::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Formatted body, once set.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Set the formatted body directly.
    pub fn set_body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    pub fn take_body(&mut self) -> Bytes {
        self.body.take().unwrap_or_default()
    }

    pub(crate) fn status_was_set(&self) -> bool {
        self.status_set
    }

    /// Body length (formatted body, else zero).
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if this is an error response (4xx or 5xx).
    #[inline]
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl From<Response> for http::Response<Bytes> {
    fn from(mut res: Response) -> Self {
        let body = res.take_body();
        let mut out = http::Response::new(body);
        *out.status_mut() = res.status;
        *out.headers_mut() = res.headers;
        out
    }
}
