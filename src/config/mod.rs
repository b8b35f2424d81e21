//! Configuration loaded from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_rest::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! let server = tokio_rest::server::create_server(config.server.server_options())?;
//! ```

mod error;
mod logging;
mod parse;
mod plugins;
mod server;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::{env_bool, env_duration, env_list, env_opt, env_or, env_parse, parse_duration};
pub use plugins::PluginsConfig;
pub use server::{ServerConfig, TlsConfig};

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub plugins: PluginsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            plugins: PluginsConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Name: {}", self.server.name);
        if !self.server.versions.is_empty() {
            info!("  Versions: {}", self.server.versions.join(", "));
        }
        info!("  HTTP/2: {}", self.server.http2);
        info!("  Max body: {} bytes", self.server.max_body_size);

        if self.server.tls.is_enabled() {
            info!("  TLS: enabled");
        }

        if let Some(ref throttle) = self.plugins.throttle {
            info!(
                "  Throttle: burst {} rate {}/s",
                throttle.burst, throttle.rate
            );
        }

        if let Some(ref stat) = self.plugins.static_files {
            info!("  Static files: {:?}", stat.directory);
        }

        if self.plugins.gzip.is_some() {
            info!("  Compression: enabled");
        }

        if self.plugins.audit.is_some() {
            info!("  Audit log: enabled");
        }
    }
}
