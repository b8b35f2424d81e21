//! Response formatters and content negotiation.
//!
//! Handlers send a [`Payload`]; once the chain finishes the server picks a
//! formatter from the response `Content-Type` (when a handler set one) or by
//! negotiating the request `Accept` header against the registered types.

use std::sync::Arc;

use base64::Engine as _;
use bytes::Bytes;
use http::StatusCode;

use crate::core::negotiate::{essence, negotiate};
use crate::core::{Payload, Request, Response};
use crate::errors::{HttpError, HttpErrorKind};

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_PLAIN: &str = "text/plain";
pub const OCTET_STREAM: &str = "application/octet-stream";
pub const APPLICATION_JAVASCRIPT: &str = "application/javascript";

/// Extension key under which the JSONP plugin stores the callback name.
pub const JSONP_CALLBACK: &str = "jsonp_callback";

/// Serializes a payload for one media type.
pub trait Formatter: Send + Sync {
    fn format(&self, req: &Request, res: &Response, payload: Payload) -> Result<Bytes, HttpError>;
}

impl<F> Formatter for F
where
    F: Fn(&Request, &Response, Payload) -> Result<Bytes, HttpError> + Send + Sync,
{
    fn format(&self, req: &Request, res: &Response, payload: Payload) -> Result<Bytes, HttpError> {
        (self)(req, res, payload)
    }
}

/// JSON: errors become `{"code","message"}`, binary becomes a base64 string.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, _req: &Request, _res: &Response, payload: Payload) -> Result<Bytes, HttpError> {
        to_json(payload).map(Bytes::from)
    }
}

fn to_json(payload: Payload) -> Result<Vec<u8>, HttpError> {
    let value = match payload {
        Payload::Empty => return Ok(Vec::new()),
        Payload::Json(v) => v,
        Payload::Text(s) => serde_json::Value::String(s),
        Payload::Bytes(b) => {
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(&b))
        }
        Payload::Error(e) => e.body(),
    };
    serde_json::to_vec(&value)
        .map_err(|e| HttpError::with_cause(HttpErrorKind::InternalServer, e, "cannot serialize body"))
}

/// Plain text: errors render their message.
pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format(&self, _req: &Request, _res: &Response, payload: Payload) -> Result<Bytes, HttpError> {
        Ok(match payload {
            Payload::Empty => Bytes::new(),
            Payload::Text(s) => Bytes::from(s),
            Payload::Bytes(b) => b,
            Payload::Json(v) => match v {
                serde_json::Value::String(s) => Bytes::from(s),
                other => Bytes::from(other.to_string()),
            },
            Payload::Error(e) => Bytes::from(e.message().to_string()),
        })
    }
}

/// Raw bytes; structured payloads fall back to their JSON form.
pub struct BinaryFormatter;

impl Formatter for BinaryFormatter {
    fn format(&self, req: &Request, res: &Response, payload: Payload) -> Result<Bytes, HttpError> {
        match payload {
            Payload::Json(_) | Payload::Error(_) => JsonFormatter.format(req, res, payload),
            other => TextFormatter.format(req, res, other),
        }
    }
}

/// JSON wrapped in a callback when the JSONP plugin saw one.
pub struct JsonpFormatter;

impl Formatter for JsonpFormatter {
    fn format(&self, req: &Request, _res: &Response, payload: Payload) -> Result<Bytes, HttpError> {
        let json = to_json(payload)?;
        match req.get::<String>(JSONP_CALLBACK) {
            Some(cb) => {
                let body = if json.is_empty() { b"null".to_vec() } else { json };
                let mut out = format!("typeof {cb} === 'function' && {cb}(").into_bytes();
                out.extend_from_slice(&body);
                out.extend_from_slice(b");");
                Ok(Bytes::from(out))
            }
            None => Ok(Bytes::from(json)),
        }
    }
}

/// Registered formatters keyed by media type, in preference order.
#[derive(Clone)]
pub struct Formatters {
    entries: Vec<(String, Arc<dyn Formatter>)>,
    types: Vec<String>,
}

impl Default for Formatters {
    fn default() -> Self {
        Self::empty()
            .with(APPLICATION_JSON, JsonFormatter)
            .with(TEXT_PLAIN, TextFormatter)
            .with(OCTET_STREAM, BinaryFormatter)
            .with(APPLICATION_JAVASCRIPT, JsonpFormatter)
    }
}

impl Formatters {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Register (or replace) the formatter for a media type.
    pub fn with<F: Formatter + 'static>(mut self, media_type: &str, formatter: F) -> Self {
        self.insert(media_type, Arc::new(formatter));
        self
    }

    pub fn insert(&mut self, media_type: &str, formatter: Arc<dyn Formatter>) {
        let key = essence(media_type);
        if let Some(entry) = self.entries.iter_mut().find(|(t, _)| *t == key) {
            entry.1 = formatter;
            return;
        }
        self.types.push(key.clone());
        self.entries.push((key, formatter));
    }

    /// Media types in preference order (the server's acceptable list).
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn get(&self, media_type: &str) -> Option<&Arc<dyn Formatter>> {
        let key = essence(media_type);
        self.entries.iter().find(|(t, _)| *t == key).map(|(_, f)| f)
    }

    /// Pick the media type for a response.
    ///
    /// A handler-set `Content-Type` wins; otherwise `Accept` is negotiated.
    /// Binary payloads default to `application/octet-stream` when the client
    /// accepts anything.
    pub fn select(&self, req: &Request, res: &Response) -> String {
        if let Some(ct) = res.content_type() {
            return essence(ct);
        }

        let accept = req.accept().filter(|a| !a.trim().is_empty());
        let wildcard = accept.map(|a| a.trim() == "*/*").unwrap_or(true);
        if wildcard && matches!(res.payload(), Payload::Bytes(_)) && self.get(OCTET_STREAM).is_some() {
            return OCTET_STREAM.to_string();
        }

        negotiate(accept, &self.types)
            .map(|t| t.to_string())
            .unwrap_or_else(|| OCTET_STREAM.to_string())
    }

    /// Serialize the response payload into its body.
    ///
    /// Does nothing when a body was already set (files, compressed output).
    pub fn format(&self, req: &Request, res: &mut Response) -> Result<(), HttpError> {
        if res.body().is_some() {
            return Ok(());
        }
        if matches!(res.payload(), Payload::Empty) {
            res.set_body(Bytes::new());
            return Ok(());
        }

        let media_type = self.select(req, res);
        let formatter = self
            .get(&media_type)
            .or_else(|| self.get(OCTET_STREAM))
            .cloned();

        let payload = res.take_payload();
        let keep_error = match &payload {
            Payload::Error(e) => Some(e.clone()),
            _ => None,
        };

        let body = match formatter {
            Some(f) => f.format(req, res, payload)?,
            None => BinaryFormatter.format(req, res, payload)?,
        };

        // the error stays observable to after hooks
        if let Some(err) = keep_error {
            res.send_error(err);
        }

        if res.content_type().is_none() {
            let ct = match res.get_char_set() {
                Some(cs) => format!("{}; charset={}", media_type, cs),
                None => media_type.clone(),
            };
            res.header("content-type", ct);
        }
        res.header("content-length", body.len().to_string());
        res.set_body(body);
        Ok(())
    }
}

/// Format a response, turning formatter failures into a 500 text body.
pub fn format_or_fail(formatters: &Formatters, req: &Request, res: &mut Response) {
    if let Err(err) = formatters.format(req, res) {
        tracing::error!(error = %err, req_id = %req.id(), "formatter failed");
        let msg = err.message().to_string();
        res.remove_header("content-type");
        res.send_status(StatusCode::INTERNAL_SERVER_ERROR, ());
        res.header("content-type", TEXT_PLAIN);
        res.header("content-length", msg.len().to_string());
        res.set_body(msg);
    }
}
