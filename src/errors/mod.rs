//! Error taxonomy for request handling.
//!
//! Two parallel families share one error type:
//!
//! - [`HttpErrorKind`] - one class per HTTP status (400 through 511)
//! - [`RestErrorKind`] - REST semantic failures with their own code
//!   (`ResourceNotFound`, `InvalidArgument`, ...)
//!
//! Both are "definite" errors. [`HttpError::from_status`] builds the generic
//! form for a status code that has no named class.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_rest::errors::{HttpError, HttpErrorKind, RestErrorKind};
//!
//! let err = HttpError::new(RestErrorKind::MissingParameter, "name is required");
//! assert_eq!(err.status().as_u16(), 409);
//! assert!(err.is_rest_error());
//!
//! let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
//! let err = HttpError::with_cause(HttpErrorKind::InsufficientStorage, io, "cannot store upload");
//! ```

mod status;
mod rest;

use std::fmt;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde_json::json;

pub use status::HttpErrorKind;
pub use rest::RestErrorKind;

/// Which family an error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Generic error identified only by its status code.
    Status,
    /// Definite HTTP status error class.
    Http(HttpErrorKind),
    /// REST error class.
    Rest(RestErrorKind),
}

impl From<HttpErrorKind> for ErrorKind {
    fn from(kind: HttpErrorKind) -> Self {
        ErrorKind::Http(kind)
    }
}

impl From<RestErrorKind> for ErrorKind {
    fn from(kind: RestErrorKind) -> Self {
        ErrorKind::Rest(kind)
    }
}

type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// An error that maps onto an HTTP response.
///
/// Handlers return it through `?`; the server formats it into the response
/// body (`{"code": ..., "message": ...}` for JSON clients).
#[derive(Clone)]
pub struct HttpError {
    kind: ErrorKind,
    status: StatusCode,
    message: String,
    cause: Option<Cause>,
    headers: HeaderMap,
}

impl HttpError {
    /// Create an error of a named class with a message.
    pub fn new(kind: impl Into<ErrorKind>, message: impl Into<String>) -> Self {
        let kind = kind.into();
        let status = match kind {
            ErrorKind::Http(k) => k.status(),
            ErrorKind::Rest(k) => k.status(),
            ErrorKind::Status => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            kind,
            status,
            message: message.into(),
            cause: None,
            headers: HeaderMap::new(),
        }
    }

    /// Create an error wrapping the error that caused it.
    pub fn with_cause<E>(kind: impl Into<ErrorKind>, cause: E, message: impl Into<String>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut err = Self::new(kind, message);
        err.cause = Some(Arc::new(cause));
        err
    }

    /// Generic error for an arbitrary status code.
    ///
    /// Resolves to the named class when the status has one.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        match HttpErrorKind::from_status(status.as_u16()) {
            Some(kind) => Self::new(kind, message),
            None => Self {
                kind: ErrorKind::Status,
                status,
                message: message.into(),
                cause: None,
                headers: HeaderMap::new(),
            },
        }
    }

    /// Attach a cause to an existing error.
    pub fn caused_by<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Add a header that is sent with the error response.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Headers to merge into the error response.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The wrapped cause, if any.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// True for every named class (HTTP or REST).
    pub fn is_definite(&self) -> bool {
        !matches!(self.kind, ErrorKind::Status)
    }

    pub fn is_rest_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Rest(_))
    }

    /// Check for a specific class.
    pub fn is(&self, kind: impl Into<ErrorKind>) -> bool {
        self.kind == kind.into()
    }

    /// Machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self.kind {
            ErrorKind::Http(k) => k.code(),
            ErrorKind::Rest(k) => k.rest_code(),
            ErrorKind::Status => "Error",
        }
    }

    /// Class name, e.g. `ResourceNotFoundError`.
    pub fn name(&self) -> &'static str {
        match self.kind {
            ErrorKind::Http(k) => k.name(),
            ErrorKind::Rest(k) => k.name(),
            ErrorKind::Status => "HttpError",
        }
    }

    /// JSON error body.
    pub fn body(&self) -> serde_json::Value {
        json!({
            "code": self.code(),
            "message": self.message,
        })
    }
}

impl fmt::Debug for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.name())
            .field("status", &self.status.as_u16())
            .field("message", &self.message)
            .field("cause", &self.cause.as_ref().map(|c| c.to_string()))
            .finish()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message)
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

impl From<HttpErrorKind> for HttpError {
    fn from(kind: HttpErrorKind) -> Self {
        let reason = kind.status().canonical_reason().unwrap_or_default();
        HttpError::new(kind, reason)
    }
}

impl From<RestErrorKind> for HttpError {
    fn from(kind: RestErrorKind) -> Self {
        HttpError::new(kind, "")
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(e: serde_json::Error) -> Self {
        let message = format!("Invalid JSON: {}", e);
        HttpError::with_cause(RestErrorKind::InvalidContent, e, message)
    }
}

impl From<std::io::Error> for HttpError {
    fn from(e: std::io::Error) -> Self {
        let message = e.to_string();
        HttpError::with_cause(RestErrorKind::Internal, e, message)
    }
}

/// Result alias used by handlers.
pub type Result<T> = std::result::Result<T, HttpError>;
