//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Handles stream endpoint and reconnect settings from files and environment

use config::{Config as ConfigBuilder, Environment, File};
use pw_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Samples retained per pool before the oldest is evicted
pub const DEFAULT_MAX_POINTS: usize = 3600;
/// Consecutive unexpected closes tolerated before giving up on a pool
pub const DEFAULT_MAX_RECONNECTS: u32 = 100;
/// Fixed delay between an unexpected close and the next attempt
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub stream: StreamConfig,
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

/// Live telemetry stream configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct StreamConfig {
    /// Origin the console was served from, e.g. `https://nas.local:8443`
    #[validate(url)]
    pub origin: String,
    /// Path of the push endpoint
    #[validate(length(min = 1))]
    pub stream_path: String,
    /// Query parameter naming the monitored pool
    #[validate(length(min = 1))]
    pub resource_param: String,
    /// Path of the seed endpoint; `{key}` is replaced by the pool name
    ///
    /// The default is the console's single-sample iostat route. Point it at
    /// an endpoint returning an array of readings for a longer backfill.
    #[validate(length(min = 1))]
    pub seed_path: String,
    #[validate(range(min = 1, max = 600000))]
    pub reconnect_delay_ms: u64,
    #[validate(range(max = 10000))]
    pub max_reconnects: u32,
    #[validate(range(min = 1, max = 1000000))]
    pub max_points: usize,
    #[validate(range(min = 100, max = 600000))]
    pub seed_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8080".to_string(),
            stream_path: "/api/ws/iostat".to_string(),
            resource_param: "pool".to_string(),
            seed_path: "/api/pools/{key}/iostat".to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_reconnects: DEFAULT_MAX_RECONNECTS,
            max_points: DEFAULT_MAX_POINTS,
            seed_timeout_ms: 10_000,
        }
    }
}

impl StreamConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn seed_timeout(&self) -> Duration {
        Duration::from_millis(self.seed_timeout_ms)
    }

    /// Build the push endpoint URL for a pool
    ///
    /// A secure origin (`https`) yields `wss`, a plain one `ws`.
    pub fn stream_url(&self, key: &str) -> Result<Url> {
        let mut url = self.parse_origin()?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(Error::Validation(format!(
                    "Unsupported origin scheme: {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::Config(format!("Cannot use scheme {} for {}", scheme, self.origin)))?;
        url.set_path(&self.stream_path);
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair(&self.resource_param, key);
        Ok(url)
    }

    /// Build the seed history URL for a pool
    pub fn seed_url(&self, key: &str) -> Result<Url> {
        let mut url = self.parse_origin()?;
        url.set_query(None);
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("Origin cannot be a base: {}", self.origin)))?;
            segments.clear();
            for segment in self.seed_path.split('/').filter(|s| !s.is_empty()) {
                if segment == "{key}" {
                    segments.push(key);
                } else {
                    segments.push(segment);
                }
            }
        }
        Ok(url)
    }

    fn parse_origin(&self) -> Result<Url> {
        Url::parse(&self.origin)
            .map_err(|e| Error::Config(format!("Invalid origin {}: {}", self.origin, e)))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `production` switches tracing output to JSON
    #[validate(length(min = 1))]
    pub environment: String,
    #[validate(length(min = 1))]
    pub service: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            service: "poolwatch".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// Environment variables use the `POOLWATCH_` prefix with `__` between
    /// nesting levels, e.g. `POOLWATCH_STREAM__MAX_RECONNECTS=10`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = StreamConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("stream.origin", defaults.origin)?
            .set_default("stream.stream_path", defaults.stream_path)?
            .set_default("stream.resource_param", defaults.resource_param)?
            .set_default("stream.seed_path", defaults.seed_path)?
            .set_default("stream.reconnect_delay_ms", defaults.reconnect_delay_ms)?
            .set_default("stream.max_reconnects", defaults.max_reconnects)?
            .set_default("stream.max_points", defaults.max_points as u64)?
            .set_default("stream.seed_timeout_ms", defaults.seed_timeout_ms)?
            .set_default("telemetry.environment", "development")?
            .set_default("telemetry.service", "poolwatch")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Environment variables (highest priority)
        builder = builder.add_source(
            Environment::with_prefix("POOLWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        parsed
            .validate()
            .map_err(|e| Error::Config(format!("Config validation failed: {}", e)))?;

        Ok(parsed)
    }
}
