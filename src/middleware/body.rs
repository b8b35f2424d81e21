//! Request body reading and parsing.
//!
//! Each factory returns a two-handler chain: a reader that enforces the size
//! limit and `Content-MD5`, followed by a parser for the body's content type.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use futures_util::stream;
use md5::{Digest, Md5};
use multer::Multipart;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::core::{negotiate::essence, Request, RequestFile, Response};
use crate::errors::{HttpError, HttpErrorKind, RestErrorKind};

use super::chain::HandlerChain;
use super::query::{map_into_params, pairs_to_object, parse_pairs};
use super::{HandlerResult, Next, RequestHandler};

/// Body parser options.
#[derive(Clone, Debug)]
pub struct BodyParserOptions {
    /// Reject bodies larger than this with 413.
    pub max_body_size: Option<usize>,
    /// Copy parsed fields into `req.params`.
    pub map_params: bool,
    /// When mapping, replace params that already exist.
    pub override_params: bool,
    /// Where multipart uploads are written; the system temp dir when unset.
    pub upload_dir: Option<PathBuf>,
    /// Keep the original file extension on stored uploads.
    pub keep_extensions: bool,
    /// Fail with 415 for content types no parser handles.
    pub reject_unknown: bool,
}

impl Default for BodyParserOptions {
    fn default() -> Self {
        Self {
            max_body_size: None,
            map_params: true,
            override_params: false,
            upload_dir: None,
            keep_extensions: false,
            reject_unknown: false,
        }
    }
}

/// Reads the body, enforcing size and digest.
pub struct BodyReader {
    max_body_size: Option<usize>,
}

#[async_trait]
impl RequestHandler for BodyReader {
    fn name(&self) -> &str {
        "body_reader"
    }

    async fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        let Some(body) = req.read_body() else {
            return Ok(Next::Continue);
        };
        if body.is_empty() {
            return Ok(Next::Continue);
        }

        if let Some(max) = self.max_body_size {
            if body.len() > max {
                return Err(HttpError::new(
                    HttpErrorKind::RequestEntityTooLarge,
                    format!("Request body size exceeds {}", max),
                ));
            }
        }

        if let Some(expected) = req.header("content-md5") {
            let digest = base64::engine::general_purpose::STANDARD.encode(Md5::digest(&body));
            if digest != expected.trim() {
                return Err(HttpError::new(
                    RestErrorKind::BadDigest,
                    "Content-MD5 did not match",
                ));
            }
        }
        Ok(Next::Continue)
    }
}

/// Which parsers a [`BodyParser`] runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Accepts {
    All,
    Json,
    UrlEncoded,
}

/// Parses the body by content type into `req.body` (and `req.files`).
pub struct BodyParser {
    options: BodyParserOptions,
    accepts: Accepts,
}

impl BodyParser {
    fn apply_fields(&self, req: &mut Request, body: Value) {
        if self.options.map_params {
            if let Value::Object(fields) = &body {
                map_into_params(fields, &mut req.params, self.options.override_params);
            }
        }
        req.body = Some(body);
    }

    fn parse_json(&self, req: &mut Request, raw: &Bytes) -> Result<(), HttpError> {
        let value: Value = serde_json::from_slice(raw)?;
        self.apply_fields(req, value);
        Ok(())
    }

    fn parse_urlencoded(&self, req: &mut Request, raw: &Bytes) -> Result<(), HttpError> {
        let text = std::str::from_utf8(raw).map_err(|e| {
            HttpError::with_cause(RestErrorKind::InvalidContent, e, "Invalid form body")
        })?;
        let fields = pairs_to_object(parse_pairs(text));
        self.apply_fields(req, Value::Object(fields));
        Ok(())
    }

    async fn parse_multipart(&self, req: &mut Request, raw: Bytes) -> Result<(), HttpError> {
        let boundary = multer::parse_boundary(req.content_type()).map_err(|e| {
            HttpError::with_cause(RestErrorKind::InvalidContent, e, "Missing multipart boundary")
        })?;
        let upload_dir = self
            .options
            .upload_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        let mut multipart = Multipart::new(
            stream::once(async move { Ok::<_, std::io::Error>(raw) }),
            boundary,
        );

        let invalid = |e: multer::Error| {
            let message = e.to_string();
            HttpError::with_cause(RestErrorKind::InvalidContent, e, message)
        };

        let mut fields = Map::new();
        while let Some(field) = multipart.next_field().await.map_err(invalid)? {
            let name = field.name().unwrap_or("").to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) if !file_name.is_empty() => {
                    let content_type = field
                        .content_type()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "application/octet-stream".to_string());
                    let data = field.bytes().await.map_err(invalid)?;

                    let mut stored = Uuid::new_v4().simple().to_string();
                    if self.options.keep_extensions {
                        if let Some(ext) = std::path::Path::new(&file_name).extension() {
                            stored.push('.');
                            stored.push_str(&ext.to_string_lossy());
                        }
                    }
                    let path = upload_dir.join(stored);

                    let mut file = tokio::fs::File::create(&path).await?;
                    file.write_all(&data).await?;
                    file.flush().await?;

                    tracing::debug!(
                        field = %name,
                        file_name = %file_name,
                        path = %path.display(),
                        size = data.len(),
                        "upload stored"
                    );

                    req.files.insert(
                        name,
                        RequestFile {
                            path: path.to_string_lossy().into_owned(),
                            content_type,
                            name: Some(file_name),
                            size: data.len() as u64,
                        },
                    );
                }
                Some(_) => {}
                None => {
                    let value = field.text().await.map_err(invalid)?;
                    fields.insert(name, Value::String(value));
                }
            }
        }

        self.apply_fields(req, Value::Object(fields));
        Ok(())
    }
}

#[async_trait]
impl RequestHandler for BodyParser {
    fn name(&self) -> &str {
        "body_parser"
    }

    async fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        if req.is_body_held() {
            tracing::debug!(req_id = %req.id(), "body still held, not parsing");
            return Ok(Next::Continue);
        }
        let raw = req.raw_body().clone();
        if raw.is_empty() {
            return Ok(Next::Continue);
        }

        let media_type = essence(req.content_type());
        match (media_type.as_str(), self.accepts) {
            ("application/json", Accepts::All | Accepts::Json) => self.parse_json(req, &raw)?,
            (t, Accepts::All | Accepts::Json) if t.ends_with("+json") => {
                self.parse_json(req, &raw)?
            }
            ("application/x-www-form-urlencoded", Accepts::All | Accepts::UrlEncoded) => {
                self.parse_urlencoded(req, &raw)?
            }
            ("multipart/form-data", Accepts::All) => self.parse_multipart(req, raw).await?,
            (other, _) if self.options.reject_unknown => {
                return Err(HttpError::new(
                    HttpErrorKind::UnsupportedMediaType,
                    other.to_string(),
                ));
            }
            _ => {}
        }
        Ok(Next::Continue)
    }
}

fn chain(options: BodyParserOptions, accepts: Accepts) -> HandlerChain {
    HandlerChain::new()
        .with(BodyReader {
            max_body_size: options.max_body_size,
        })
        .with(BodyParser { options, accepts })
}

/// Reader plus JSON, urlencoded and multipart parsers.
pub fn body_parser(options: BodyParserOptions) -> HandlerChain {
    chain(options, Accepts::All)
}

/// Reader plus the urlencoded parser only.
pub fn url_encoded_body_parser(options: BodyParserOptions) -> HandlerChain {
    chain(options, Accepts::UrlEncoded)
}

/// Reader plus the JSON parser only.
pub fn json_body_parser(options: BodyParserOptions) -> HandlerChain {
    chain(options, Accepts::Json)
}
