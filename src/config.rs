//! Configuration Module
//!
//! Server settings come from environment variables. The relay itself (routes,
//! domain policy, cache policy) is described by a JSON document that can be
//! reloaded while the server runs.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::relay::ProxyAuth;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Path to the relay configuration document, if any
    pub relay_config_path: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `RELAY_CONFIG` - Path to the relay configuration JSON (default: none)
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            cleanup_interval: env::var("CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            relay_config_path: env::var("RELAY_CONFIG").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Loads the relay document named by `RELAY_CONFIG`, or the defaults when unset.
    pub fn load_relay_config(&self) -> Result<RelayConfig, ConfigError> {
        match &self.relay_config_path {
            Some(path) => RelayConfig::from_file(path),
            None => Ok(RelayConfig::default()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 60,
            relay_config_path: None,
        }
    }
}

// == Relay Config ==
/// Relay configuration document. Swapped wholesale on reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    /// Per-attempt upstream timeout in milliseconds
    pub timeout: u64,
    /// Number of re-tries after the first attempt
    pub retries: u32,
    /// Base backoff delay in milliseconds
    pub retry_base_delay: u64,
    pub allowed_domains: Vec<String>,
    pub blocked_domains: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub routes: Vec<ProxyRoute>,
    pub cache: CachePolicy,
}

impl RelayConfig {
    /// Reads and parses a relay configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parses a relay configuration from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            timeout: 30_000,
            retries: 3,
            retry_base_delay: 1_000,
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
            allowed_origins: vec!["*".to_string()],
            routes: Vec::new(),
            cache: CachePolicy::default(),
        }
    }
}

// == Cache Policy ==
/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachePolicy {
    pub enabled: bool,
    /// Default TTL in milliseconds
    #[serde(rename = "defaultTTL")]
    pub default_ttl: u64,
    /// Maximum number of entries
    pub max_size: usize,
    /// TTL overrides in milliseconds, keyed by route name
    #[serde(rename = "perRouteTTL")]
    pub per_route_ttl: HashMap<String, u64>,
}

impl CachePolicy {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl)
    }

    /// TTL override for a route, if one is configured.
    pub fn ttl_for(&self, route: &str) -> Option<Duration> {
        self.per_route_ttl
            .get(route)
            .map(|ms| Duration::from_millis(*ms))
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: 300_000,
            max_size: 1000,
            per_route_ttl: HashMap::new(),
        }
    }
}

// == Proxy Route ==
/// A named mapping from `/relay/<name>/...` to an upstream base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRoute {
    pub name: String,
    /// Upstream base URL
    pub target: String,
    /// Applied in declaration order to the trailing path
    #[serde(default)]
    pub path_rewrite: Vec<PathRewrite>,
    /// Static headers added to every forwarded request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub auth: Option<ProxyAuth>,
}

/// A single `pattern -> replacement` rewrite rule. `pattern` is a regular expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRewrite {
    pub pattern: String,
    pub replacement: String,
}
