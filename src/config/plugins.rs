//! Plugin configuration.

use std::path::PathBuf;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_list, env_opt, env_parse};
use super::ConfigError;
use crate::middleware::{AuditOptions, CorsOptions, GzipOptions, StaticOptions, ThrottleOptions};

/// Which optional plugins the binary installs.
#[derive(Clone, Debug, Default)]
pub struct PluginsConfig {
    /// Token bucket throttling (`THROTTLE_BURST` > 0 enables it).
    pub throttle: Option<ThrottleOptions>,
    /// Compress responses (`GZIP=1`).
    pub gzip: Option<GzipOptions>,
    /// Audit record per request (`AUDIT_LOG=1`).
    pub audit: Option<AuditOptions>,
    /// CORS origins (`CORS_ORIGINS=*` or a comma separated list).
    pub cors: Option<CorsOptions>,
    /// Static files under `STATIC_DIR`.
    pub static_files: Option<StaticOptions>,
}

impl PluginsConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let burst: u32 = env_parse("THROTTLE_BURST", 0)?;
        let rate: f64 = env_parse("THROTTLE_RATE", 0.0)?;
        if burst > 0 && rate <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "THROTTLE_RATE".into(),
                message: "must be positive when THROTTLE_BURST is set".into(),
            });
        }
        let throttle = (burst > 0).then(|| ThrottleOptions {
            burst,
            rate,
            ip: !env_bool("THROTTLE_XFF", false),
            xff: env_bool("THROTTLE_XFF", false),
            ..Default::default()
        });

        let gzip = env_bool("GZIP", false).then(|| GzipOptions {
            brotli: env_bool("BROTLI", false),
            ..Default::default()
        });

        let audit = env_bool("AUDIT_LOG", false).then(|| AuditOptions {
            body: env_bool("AUDIT_BODY", false),
            ..Default::default()
        });

        let origins = env_list("CORS_ORIGINS");
        let cors = (!origins.is_empty()).then(|| CorsOptions {
            origins,
            credentials: env_bool("CORS_CREDENTIALS", false),
            ..Default::default()
        });

        let static_files = match env_opt("STATIC_DIR") {
            Some(dir) => Some(StaticOptions {
                directory: PathBuf::from(dir),
                default: env_opt("STATIC_INDEX"),
                max_age: env_duration("STATIC_MAX_AGE", "1h")?.unwrap_or(Duration::ZERO),
                ..Default::default()
            }),
            None => None,
        };

        Ok(Self {
            throttle,
            gzip,
            audit,
            cors,
            static_files,
        })
    }
}
