//! Configuration management for Visitguard.
//!
//! Values come from serde defaults, then an optional file, then
//! `VISITGUARD__`-prefixed environment variables, e.g.
//! `VISITGUARD__RATE_LIMITING__MAX_REQUESTS=5`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, VisitguardError};
use crate::ratelimit::{Limits, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS};

const ENV_PREFIX: &str = "VISITGUARD";

/// Main configuration for the Visitguard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisitguardConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8090))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Requests admitted per window when the caller gives no limit
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in milliseconds when the caller gives none
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Seconds between idle-identifier sweeps; 0 disables sweeping
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_max_requests() -> u32 {
    DEFAULT_MAX_REQUESTS
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

fn default_sweep_interval() -> u64 {
    60
}

impl RateLimitingConfig {
    /// The default limits handed to the rate limiter.
    pub fn limits(&self) -> Limits {
        Limits::new(self.max_requests, self.window_ms)
    }

    /// The sweep interval, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl VisitguardConfig {
    /// Load configuration from an optional file overlaid with the environment.
    ///
    /// The file format follows its extension (YAML, TOML or JSON).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| VisitguardError::Config(format!("Failed to parse configuration: {}", e)))
    }
}
