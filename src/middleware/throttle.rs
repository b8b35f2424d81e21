//! Request throttling.
//!
//! Token bucket per client key (remote IP, `X-Forwarded-For` or username).
//! Buckets live in an LRU table bounded by `max_keys`.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use lru::LruCache;

use crate::core::{Request, Response};
use crate::errors::{HttpError, RestErrorKind};

use super::{HandlerResult, Next, RequestHandler};

/// Default size of the bucket table.
pub const DEFAULT_MAX_KEYS: usize = 10_000;

/// Per-key limits that replace the global ones.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThrottleOverride {
    pub burst: u32,
    pub rate: f64,
}

/// Throttle configuration.
///
/// Exactly one of `ip`, `xff`, `username` selects the bucket key.
#[derive(Clone, Debug)]
pub struct ThrottleOptions {
    /// Bucket capacity.
    pub burst: u32,
    /// Refill rate in requests per second.
    pub rate: f64,
    pub ip: bool,
    pub xff: bool,
    pub username: bool,
    pub max_keys: usize,
    pub overrides: HashMap<String, ThrottleOverride>,
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            burst: 100,
            rate: 50.0,
            ip: true,
            xff: false,
            username: false,
            max_keys: DEFAULT_MAX_KEYS,
            overrides: HashMap::new(),
        }
    }
}

/// Token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    fill_rate: f64,
    last: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, fill_rate: f64) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            fill_rate,
            last: Instant::now(),
        }
    }

    fn consume(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.fill_rate).min(self.capacity);
        self.last = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Throttle handler.
pub struct Throttle {
    options: ThrottleOptions,
    table: Mutex<LruCache<String, TokenBucket>>,
}

impl Throttle {
    pub fn new(options: ThrottleOptions) -> Self {
        let cap = NonZeroUsize::new(options.max_keys).unwrap_or(NonZeroUsize::MIN);
        Self {
            table: Mutex::new(LruCache::new(cap)),
            options,
        }
    }

    fn key(&self, req: &Request) -> Option<String> {
        if self.options.username {
            req.username.clone()
        } else if self.options.xff {
            req.header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        } else if self.options.ip {
            Some(req.client_ip().to_string())
        } else {
            None
        }
    }

    /// Check and consume one token for `key`.
    ///
    /// Returns the limit that applied when the key is out of tokens.
    fn check(&self, key: &str) -> Result<(), ThrottleOverride> {
        let limits = self
            .options
            .overrides
            .get(key)
            .copied()
            .unwrap_or(ThrottleOverride {
                burst: self.options.burst,
                rate: self.options.rate,
            });

        // zero burst or rate means unlimited
        if limits.burst == 0 || limits.rate <= 0.0 {
            return Ok(());
        }

        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = table.get_or_insert_mut(key.to_string(), || {
            TokenBucket::new(limits.burst, limits.rate)
        });

        if bucket.consume(Instant::now()) {
            Ok(())
        } else {
            Err(limits)
        }
    }
}

#[async_trait]
impl RequestHandler for Throttle {
    fn name(&self) -> &str {
        "throttle"
    }

    async fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        let Some(key) = self.key(req) else {
            return Ok(Next::Continue);
        };

        match self.check(&key) {
            Ok(()) => Ok(Next::Continue),
            Err(limits) => {
                tracing::debug!(
                    key = %key,
                    burst = limits.burst,
                    rate = limits.rate,
                    req_id = %req.id(),
                    "request throttled"
                );
                Err(HttpError::new(
                    RestErrorKind::RequestThrottled,
                    format!("You have exceeded your request rate of {} r/s.", limits.rate),
                ))
            }
        }
    }
}

/// Create a throttle handler.
pub fn throttle(options: ThrottleOptions) -> Throttle {
    Throttle::new(options)
}
