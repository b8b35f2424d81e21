//! Inbound HTTP request with the framework conveniences handlers rely on.

use std::any::Any;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::negotiate::{normalize_type, parse_accept, type_matches};

/// Header name constants for fast lookup.
mod header_names {
    use super::*;

    pub static ACCEPT: HeaderName = header::ACCEPT;
    pub static ACCEPT_ENCODING: HeaderName = header::ACCEPT_ENCODING;
    pub static CONTENT_TYPE: HeaderName = header::CONTENT_TYPE;
    pub static CONTENT_LENGTH: HeaderName = header::CONTENT_LENGTH;
    pub static USER_AGENT: HeaderName = header::USER_AGENT;
}

static X_REQUEST_ID: std::sync::LazyLock<HeaderName> =
    std::sync::LazyLock::new(|| HeaderName::from_static("x-request-id"));
static ACCEPT_VERSION: std::sync::LazyLock<HeaderName> =
    std::sync::LazyLock::new(|| HeaderName::from_static("accept-version"));
static X_API_VERSION: std::sync::LazyLock<HeaderName> =
    std::sync::LazyLock::new(|| HeaderName::from_static("x-api-version"));

/// Default content type when a request carries none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Uploaded file written to disk by the multipart body parser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFile {
    /// Where the upload was stored.
    pub path: String,
    /// Content type sent by the client.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Original file name, if the client sent one.
    pub name: Option<String>,
    pub size: u64,
}

/// Decoded `Basic` credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Parsed `Authorization` header (set by the authorization parser).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    pub scheme: String,
    pub credentials: String,
    pub basic: Option<BasicAuth>,
}

/// HTTP request as seen by handlers.
///
/// Note: Clone is intentionally not derived; handlers receive `&mut Request`.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    raw_body: Bytes,
    version: http::Version,
    id: String,
    client_ip: IpAddr,
    secure: bool,
    time: SystemTime,
    started_at: Instant,
    route: Option<String>,
    body_held: bool,
    body_read: bool,

    /// Route parameters (and mapped query/body fields).
    pub params: HashMap<String, String>,
    /// Parsed query string; repeated keys become arrays.
    pub query: Map<String, Value>,
    /// Parsed body, available after a body parser ran.
    pub body: Option<Value>,
    /// Uploaded files, available after the multipart parser ran.
    pub files: HashMap<String, RequestFile>,
    /// Set by the authorization parser (`anonymous` when no credentials).
    pub username: Option<String>,
    /// Set by the authorization parser.
    pub authorization: Option<Authorization>,
    /// Request-scoped span; the request logger attaches a child with `req_id`.
    pub log: tracing::Span,

    extensions: HashMap<String, Box<dyn Any + Send + Sync>>,
    /// Extensions hyper attached to the request (holds the upgrade handle).
    http_extensions: http::Extensions,
}

impl Request {
    /// Create a new request.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let id = headers
            .get(&*X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            method,
            uri,
            headers,
            raw_body: body,
            version: http::Version::HTTP_11,
            id,
            client_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            secure: false,
            time: SystemTime::now(),
            started_at: Instant::now(),
            route: None,
            body_held: false,
            body_read: false,
            params: HashMap::new(),
            query: Map::new(),
            body: None,
            files: HashMap::new(),
            username: None,
            authorization: None,
            log: tracing::Span::none(),
            extensions: HashMap::new(),
            http_extensions: http::Extensions::new(),
        }
    }

    /// Attach the extensions of the underlying HTTP request.
    pub fn with_http_extensions(mut self, extensions: http::Extensions) -> Self {
        self.http_extensions = extensions;
        self
    }

    pub fn http_extensions(&self) -> &http::Extensions {
        &self.http_extensions
    }

    /// Take the connection upgrade handle.
    ///
    /// Resolves to the raw connection once the handler has answered with
    /// `101 Switching Protocols`. Only available when the server handles
    /// upgrades, and only once per request.
    pub fn upgrade(&mut self) -> Option<hyper::upgrade::OnUpgrade> {
        self.http_extensions.remove::<hyper::upgrade::OnUpgrade>()
    }

    /// Set the peer address.
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = ip;
        self
    }

    /// Mark the request as received over TLS.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string.
    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw query string.
    #[inline]
    pub fn query_string(&self) -> Option<&str> {
        self.uri.query()
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Replace the URI (used by path rewriting pre-handlers).
    pub fn set_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }

    /// Path and query as the client sent them.
    pub fn href(&self) -> String {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| self.uri.path().to_string())
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[inline]
    pub fn version(&self) -> http::Version {
        self.version
    }

    #[inline]
    pub fn set_version(&mut self, version: http::Version) {
        self.version = version;
    }

    /// Unique request id (`X-Request-Id` when the client sent one).
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn client_ip(&self) -> IpAddr {
        self.client_ip
    }

    #[inline]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Wall-clock receive time in milliseconds since the epoch.
    pub fn time(&self) -> u64 {
        self.time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Elapsed time in milliseconds.
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Get a header value (case-insensitive). `referer` and `referrer` are aliases.
    pub fn header(&self, name: &str) -> Option<&str> {
        let value = self.headers.get(name).and_then(|v| v.to_str().ok());
        if value.is_some() {
            return value;
        }
        let alias = if name.eq_ignore_ascii_case("referer") {
            "referrer"
        } else if name.eq_ignore_ascii_case("referrer") {
            "referer"
        } else {
            return None;
        };
        self.headers.get(alias).and_then(|v| v.to_str().ok())
    }

    /// Get a header value or a default.
    pub fn header_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.header(name).unwrap_or(default)
    }

    #[inline]
    fn header_by_name(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[inline]
    pub fn accept(&self) -> Option<&str> {
        self.header_by_name(&header_names::ACCEPT)
    }

    #[inline]
    pub fn accept_encoding(&self) -> Option<&str> {
        self.header_by_name(&header_names::ACCEPT_ENCODING)
    }

    /// Check whether the client accepts a media type (shorthand like `json` allowed).
    ///
    /// A request without `Accept` accepts everything.
    pub fn accepts(&self, media_type: &str) -> bool {
        let wanted = normalize_type(media_type);
        match self.accept() {
            None => true,
            Some(accept) if accept.trim().is_empty() => true,
            Some(accept) => parse_accept(accept)
                .iter()
                .any(|entry| type_matches(&entry.media_type, &wanted)),
        }
    }

    /// Check whether the client accepts a content coding (`gzip`, `br`).
    pub fn accepts_encoding(&self, coding: &str) -> bool {
        self.accept_encoding()
            .map(|v| {
                parse_accept(v)
                    .iter()
                    .any(|e| e.media_type == coding || e.media_type == "*")
            })
            .unwrap_or(false)
    }

    /// Check the request content type (shorthand like `json` allowed).
    pub fn is(&self, media_type: &str) -> bool {
        let wanted = normalize_type(media_type);
        match self.header_by_name(&header_names::CONTENT_TYPE) {
            Some(ct) => type_matches(&wanted, ct),
            None => false,
        }
    }

    /// Content type, `application/octet-stream` when missing.
    pub fn content_type(&self) -> &str {
        self.header_by_name(&header_names::CONTENT_TYPE)
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Declared `Content-Length`, falling back to the buffered body size.
    pub fn content_length(&self) -> u64 {
        self.header_by_name(&header_names::CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.raw_body.len() as u64)
    }

    #[inline]
    pub fn user_agent(&self) -> Option<&str> {
        self.header_by_name(&header_names::USER_AGENT)
    }

    /// Requested API version range (`Accept-Version`), `*` when absent.
    pub fn api_version(&self) -> &str {
        self.header_by_name(&ACCEPT_VERSION)
            .or_else(|| self.header_by_name(&X_API_VERSION))
            .unwrap_or("*")
    }

    /// Child span for a named component.
    pub fn get_logger(&self, component: &str) -> tracing::Span {
        tracing::debug_span!(parent: &self.log, "component", component = component, req_id = %self.id)
    }

    /// Name of the route that matched, once routing ran.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub(crate) fn set_route(&mut self, name: impl Into<String>) {
        self.route = Some(name.into());
    }

    /// Buffered request body.
    ///
    /// Empty while the body is held; [`read_body`](Self::read_body) releases it.
    #[inline]
    pub fn raw_body(&self) -> &Bytes {
        static HELD: Bytes = Bytes::new();
        if self.body_held {
            &HELD
        } else {
            &self.raw_body
        }
    }

    /// Hold the body until a body reader takes it.
    pub fn hold_body(&mut self) {
        self.body_held = true;
    }

    #[inline]
    pub fn is_body_held(&self) -> bool {
        self.body_held
    }

    /// Take the body for parsing; releases a hold.
    ///
    /// Returns `None` when a reader already consumed it.
    pub fn read_body(&mut self) -> Option<Bytes> {
        if self.body_read {
            return None;
        }
        self.body_held = false;
        self.body_read = true;
        Some(self.raw_body.clone())
    }

    /// Store a typed value under a key.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.extensions.insert(key.to_string(), Box::new(value));
    }

    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.extensions.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.extensions.get_mut(key).and_then(|v| v.downcast_mut())
    }

    pub fn remove<T: 'static>(&mut self, key: &str) -> Option<T> {
        self.extensions
            .remove(key)
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }
}

impl<B> From<http::Request<B>> for Request
where
    B: Into<Bytes>,
{
    fn from(req: http::Request<B>) -> Self {
        let (parts, body) = req.into_parts();
        let mut request = Request::new(parts.method, parts.uri, parts.headers, body.into())
            .with_http_extensions(parts.extensions);
        request.version = parts.version;
        request
    }
}
