//! Static file serving.
//!
//! Maps the request path onto a directory, with `Cache-Control`, `ETag` and
//! `Last-Modified` headers. Paths resolving outside the directory are refused.

use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use http::{Method, StatusCode};

use crate::core::{CacheType, Request, Response};
use crate::errors::{HttpError, HttpErrorKind, RestErrorKind};

use super::conditional::{evaluate, Precondition};
use super::{HandlerResult, Next, RequestHandler};

/// Static file options.
#[derive(Clone, Debug)]
pub struct StaticOptions {
    /// Root directory.
    pub directory: PathBuf,
    /// File served for directory requests (e.g. `index.html`).
    pub default: Option<String>,
    /// Serve this file for every request instead of mapping the path.
    pub file: Option<String>,
    /// `Cache-Control` max-age.
    pub max_age: Duration,
    /// Charset appended to text content types.
    pub char_set: Option<String>,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            default: None,
            file: None,
            max_age: Duration::from_secs(3600),
            char_set: None,
        }
    }
}

/// Static file handler.
pub struct ServeStatic {
    options: StaticOptions,
}

/// Weak validator built from size and mtime.
fn file_etag(len: u64, mtime_secs: u64) -> String {
    format!("\"{:x}-{:x}\"", len, mtime_secs)
}

impl ServeStatic {
    fn resolve(&self, req_path: &str) -> PathBuf {
        let decoded = percent_encoding::percent_decode_str(req_path).decode_utf8_lossy();
        match &self.options.file {
            Some(file) => self.options.directory.join(file),
            None => self.options.directory.join(decoded.trim_start_matches('/')),
        }
    }

    async fn canonical_within(&self, path: &Path, req_path: &str) -> Result<PathBuf, HttpError> {
        let not_found = || {
            HttpError::new(
                RestErrorKind::ResourceNotFound,
                format!("{} does not exist", req_path),
            )
        };
        let root = tokio::fs::canonicalize(&self.options.directory)
            .await
            .map_err(|_| not_found())?;
        let file = tokio::fs::canonicalize(path).await.map_err(|_| not_found())?;
        if !file.starts_with(&root) {
            return Err(HttpError::new(
                RestErrorKind::NotAuthorized,
                format!("{} is not allowed", req_path),
            ));
        }
        Ok(file)
    }
}

#[async_trait]
impl RequestHandler for ServeStatic {
    fn name(&self) -> &str {
        "serve_static"
    }

    async fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return Err(HttpError::new(
                HttpErrorKind::MethodNotAllowed,
                format!("{} is not allowed", req.method()),
            )
            .with_header("Allow", "GET, HEAD"));
        }

        let req_path = req.path().to_string();
        let mut file = self
            .canonical_within(&self.resolve(&req_path), &req_path)
            .await?;
        let mut meta = tokio::fs::metadata(&file).await?;

        if meta.is_dir() {
            let Some(default) = &self.options.default else {
                return Err(HttpError::new(
                    RestErrorKind::ResourceNotFound,
                    format!("{} does not exist", req_path),
                ));
            };
            file = self.canonical_within(&file.join(default), &req_path).await?;
            meta = tokio::fs::metadata(&file).await?;
        }

        let modified = meta.modified().ok();
        let mtime = modified
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        res.cache(CacheType::Public, Some(self.options.max_age));
        res.set_etag(&file_etag(meta.len(), mtime));
        if let Some(m) = modified {
            res.set_last_modified(m);
        }

        match evaluate(req, res) {
            Precondition::NotModified => {
                res.send_status(StatusCode::NOT_MODIFIED, ());
                return Ok(Next::Stop);
            }
            Precondition::Failed(err) => return Err(err),
            Precondition::Pass => {}
        }

        let mime = mime_guess::from_path(&file).first_or_octet_stream();
        let content_type = match &self.options.char_set {
            Some(cs) if mime.type_() == mime_guess::mime::TEXT => {
                format!("{}; charset={}", mime.essence_str(), cs)
            }
            _ => mime.essence_str().to_string(),
        };

        let contents = tokio::fs::read(&file).await.map_err(|e| {
            tracing::error!(path = %file.display(), error = %e, "failed to read file");
            HttpError::from(e)
        })?;

        res.header("content-type", content_type);
        res.header("content-length", contents.len().to_string());
        res.set_status(StatusCode::OK);
        res.send(());
        res.set_body(contents);
        Ok(Next::Stop)
    }
}

/// Create a static file handler.
pub fn serve_static(options: StaticOptions) -> ServeStatic {
    ServeStatic { options }
}
