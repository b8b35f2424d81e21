//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_list, env_opt, env_or, env_parse};
use super::ConfigError;
use crate::server::{ServerOptions, DEFAULT_MAX_BODY_SIZE};

/// TLS configuration.
#[derive(Clone, Debug, Default)]
pub struct TlsConfig {
    /// Path to TLS certificate (PEM format).
    pub cert_path: Option<PathBuf>,
    /// Path to TLS private key (PEM format).
    pub key_path: Option<PathBuf>,
}

impl TlsConfig {
    /// Check if TLS is configured.
    pub fn is_enabled(&self) -> bool {
        self.cert_path.is_some() && self.key_path.is_some()
    }

    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self {
            cert_path: env_opt("TLS_CERT").map(PathBuf::from),
            key_path: env_opt("TLS_KEY").map(PathBuf::from),
        }
    }
}

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080).
    pub listen_addr: SocketAddr,
    /// Server name (`Server` header).
    pub name: String,
    /// Default API versions (`API_VERSIONS=1.0.0,2.0.0`).
    pub versions: Vec<String>,
    /// Offer HTTP/2.
    pub http2: bool,
    /// Accept loops (0 = one per CPU).
    pub workers: usize,
    /// Buffered request body limit in bytes.
    pub max_body_size: usize,
    /// Graceful shutdown drain timeout.
    pub drain_timeout: Duration,
    /// HTTP/1 header read timeout.
    pub header_timeout: Duration,
    pub strict_routing: bool,
    /// TLS configuration.
    pub tls: TlsConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr: SocketAddr = env_parse("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let versions = env_list("API_VERSIONS");
        for version in &versions {
            if semver::Version::parse(version).is_err() {
                return Err(ConfigError::Invalid {
                    key: "API_VERSIONS".into(),
                    message: format!("{} is not a semantic version", version),
                });
            }
        }

        let tls = TlsConfig::from_env();
        if tls.cert_path.is_some() != tls.key_path.is_some() {
            return Err(ConfigError::Invalid {
                key: "TLS_CERT/TLS_KEY".into(),
                message: "both certificate and key are required".into(),
            });
        }

        Ok(Self {
            listen_addr,
            name: env_or("SERVER_NAME", "tokio_rest"),
            versions,
            http2: env_bool("HTTP2", true),
            workers: env_parse("WORKERS", 0usize)?,
            max_body_size: env_parse("MAX_BODY_SIZE", DEFAULT_MAX_BODY_SIZE)?,
            drain_timeout: env_duration("DRAIN_TIMEOUT", "30s")?.unwrap_or(Duration::ZERO),
            header_timeout: env_duration("HEADER_TIMEOUT", "5s")?
                .unwrap_or(Duration::from_secs(5)),
            strict_routing: env_bool("STRICT_ROUTING", false),
            tls,
        })
    }

    /// Build server options from this configuration.
    pub fn server_options(&self) -> ServerOptions {
        let mut options = ServerOptions::new(self.name.clone())
            .with_http2(self.http2)
            .with_workers(self.workers)
            .with_max_body_size(self.max_body_size)
            .with_drain_timeout(self.drain_timeout)
            .with_strict_routing(self.strict_routing);
        options.header_timeout = self.header_timeout;
        for version in &self.versions {
            options = options.with_version(version.clone());
        }
        if let (Some(cert), Some(key)) = (&self.tls.cert_path, &self.tls.key_path) {
            options = options.with_tls(cert.clone(), key.clone());
        }
        options
    }
}
