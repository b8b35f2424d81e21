//! Response compression.
//!
//! Compresses the formatted body when:
//! - the client accepts `gzip` (or `br`, when brotli is enabled)
//! - the body is within size limits
//! - the content type is compressible

use std::io::Write;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::core::{Request, Response};

use super::{HandlerResult, Next, RequestHandler};

/// Minimum size to consider compression (smaller bodies don't benefit).
pub const MIN_COMPRESSION_SIZE: usize = 256;

/// Maximum size to compress (3 MB).
pub const MAX_COMPRESSION_SIZE: usize = 3 * 1024 * 1024;

/// Brotli compression quality (0-11, higher = better but slower).
const BROTLI_QUALITY: i32 = 4;

/// Brotli compression window size.
const BROTLI_WINDOW: i32 = 20;

/// Compression options.
#[derive(Clone, Debug)]
pub struct GzipOptions {
    /// gzip level, 0-9.
    pub level: u32,
    pub min_size: usize,
    pub max_size: usize,
    /// Prefer brotli when the client accepts `br`.
    pub brotli: bool,
}

impl Default for GzipOptions {
    fn default() -> Self {
        Self {
            level: 6,
            min_size: MIN_COMPRESSION_SIZE,
            max_size: MAX_COMPRESSION_SIZE,
            brotli: false,
        }
    }
}

/// Check if the MIME type should be compressed.
#[inline]
pub fn should_compress_mime(content_type: &str) -> bool {
    let ct = content_type.split(';').next().unwrap_or("").trim();
    ct.starts_with("text/")
        || ct.ends_with("+json")
        || ct.ends_with("+xml")
        || matches!(
            ct,
            "application/javascript"
                | "application/json"
                | "application/xml"
                | "application/x-www-form-urlencoded"
                | "image/svg+xml"
                | "font/ttf"
                | "font/otf"
        )
}

/// Compress data using gzip. Returns None if compression would not reduce size.
pub fn compress_gzip(data: &[u8], level: u32) -> Option<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::new(level));
    encoder.write_all(data).ok()?;
    let output = encoder.finish().ok()?;
    (output.len() < data.len()).then_some(output)
}

/// Compress data using Brotli. Returns None if compression would not reduce size.
pub fn compress_brotli(data: &[u8]) -> Option<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() / 2);
    let mut input = std::io::Cursor::new(data);
    let params = brotli::enc::BrotliEncoderParams {
        quality: BROTLI_QUALITY,
        lgwin: BROTLI_WINDOW,
        ..Default::default()
    };

    match brotli::BrotliCompress(&mut input, &mut output, &params) {
        Ok(_) if output.len() < data.len() => Some(output),
        _ => None,
    }
}

/// Compression handler; the work happens in `on_response`.
pub struct GzipResponse {
    options: GzipOptions,
}

impl GzipResponse {
    fn should_compress(&self, res: &Response) -> bool {
        let len = res.body_len();
        if len < self.options.min_size || len > self.options.max_size {
            return false;
        }
        if res.has_header("content-encoding") {
            return false;
        }
        res.content_type().map(should_compress_mime).unwrap_or(false)
    }
}

#[async_trait]
impl RequestHandler for GzipResponse {
    fn name(&self) -> &str {
        "gzip_response"
    }

    async fn handle(&self, _req: &mut Request, _res: &mut Response) -> HandlerResult {
        Ok(Next::Continue)
    }

    fn on_response(&self, req: &Request, res: &mut Response) {
        let use_brotli = self.options.brotli && req.accepts_encoding("br");
        if !use_brotli && !req.accepts_encoding("gzip") {
            return;
        }
        if !self.should_compress(res) {
            return;
        }

        let Some(body) = res.body().cloned() else {
            return;
        };
        let (compressed, encoding) = if use_brotli {
            (compress_brotli(&body), "br")
        } else {
            (compress_gzip(&body, self.options.level), "gzip")
        };

        if let Some(compressed) = compressed {
            tracing::trace!(
                original = body.len(),
                compressed = compressed.len(),
                encoding = encoding,
                "compressed response"
            );
            res.header("content-encoding", encoding);
            res.append_header("vary", "Accept-Encoding");
            res.header("content-length", compressed.len().to_string());
            res.set_body(compressed);
        }
    }
}

/// Create the compression handler.
pub fn gzip_response(options: GzipOptions) -> GzipResponse {
    GzipResponse { options }
}
