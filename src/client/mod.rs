//! Outbound HTTP clients.
//!
//! Three flavors share one transport:
//!
//! - [`HttpClient`] returns raw bytes
//! - [`StringClient`] returns text and sends text or form bodies
//! - [`JsonClient`] serializes and parses JSON
//!
//! Responses with status >= 400 become [`ClientError::Http`] carrying an
//! [`HttpError`] rebuilt from the body's `code`/`message`.
//!
//! ```rust,ignore
//! use tokio_rest::client::{create_json_client, ClientOptions};
//!
//! let client = create_json_client(ClientOptions::new("http://127.0.0.1:8080"))?;
//! let res = client.get("/users/42").await?;
//! println!("{} {}", res.status, res.body["name"]);
//! ```

mod json;
mod raw;
mod retry;
mod string;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, Method, StatusCode};
use thiserror::Error;

use crate::errors::{HttpError, RestErrorKind};

pub use json::JsonClient;
pub use raw::HttpClient;
pub use retry::RetryPolicy;
pub use string::StringClient;

/// Hook run on every outgoing request (including retries), e.g. to add a
/// signature header.
pub type SignRequest = Arc<dyn Fn(&mut reqwest::Request) + Send + Sync>;

/// Client configuration.
#[derive(Clone)]
pub struct ClientOptions {
    /// Base URL, e.g. `http://127.0.0.1:8080`.
    pub url: String,
    /// `Accept` header; each client flavor sets its own default.
    pub accept: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    /// Ask for and transparently decode gzip responses.
    pub gzip: bool,
    /// Headers sent with every request.
    pub headers: HeaderMap,
    pub retry: RetryPolicy,
    pub sign_request: Option<SignRequest>,
    pub user_agent: String,
    /// `Accept-Version` sent with every request.
    pub version: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            accept: None,
            connect_timeout: Some(Duration::from_secs(10)),
            request_timeout: None,
            gzip: false,
            headers: HeaderMap::new(),
            retry: RetryPolicy::default(),
            sign_request: None,
            user_agent: format!("tokio_rest/{}", env!("CARGO_PKG_VERSION")),
            version: None,
        }
    }
}

impl ClientOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::try_from(name),
            http::HeaderValue::try_from(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_sign_request<F>(mut self, sign: F) -> Self
    where
        F: Fn(&mut reqwest::Request) + Send + Sync + 'static,
    {
        self.sign_request = Some(Arc::new(sign));
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("url", &self.url)
            .field("accept", &self.accept)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("gzip", &self.gzip)
            .field("retry", &self.retry)
            .field("user_agent", &self.user_agent)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// The request a response belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: Method,
    pub url: String,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// A completed exchange.
#[derive(Clone, Debug)]
pub struct ClientResponse<T> {
    pub request: RequestInfo,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: T,
}

impl<T> ClientResponse<T> {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn map<U>(self, f: impl FnOnce(T) -> U) -> ClientResponse<U> {
        ClientResponse {
            request: self.request,
            status: self.status,
            headers: self.headers,
            body: f(self.body),
        }
    }
}

/// Client failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with an error status.
    #[error("{} {}: {error}", .response.request.method, .response.request.url)]
    Http {
        error: HttpError,
        response: Box<ClientResponse<String>>,
    },

    #[error("cannot decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Status code for server-side errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http { error, .. } => Some(error.status()),
            _ => None,
        }
    }

    /// The rebuilt server error, if any.
    pub fn http_error(&self) -> Option<&HttpError> {
        match self {
            ClientError::Http { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Rebuild the server's error from a response body.
///
/// The REST code wins; otherwise the status picks the class.
pub(crate) fn error_from_body(status: StatusCode, body: &str) -> HttpError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("code"))
        .and_then(|c| c.as_str());
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    match code.and_then(RestErrorKind::from_code) {
        Some(kind) => HttpError::new(kind, message),
        None => HttpError::from_status(status, message),
    }
}

/// Create a raw client.
pub fn create_client(options: ClientOptions) -> Result<HttpClient, ClientError> {
    HttpClient::new(options)
}

/// Create a JSON client.
pub fn create_json_client(options: ClientOptions) -> Result<JsonClient, ClientError> {
    JsonClient::new(options)
}

/// Create a text client.
pub fn create_string_client(options: ClientOptions) -> Result<StringClient, ClientError> {
    StringClient::new(options)
}
