//! Configuration for mcdcache
//!
//! ```toml
//! [general]
//! server = ["cache-a:11211", "cache-b"]
//! ttl = 0
//! binary_proto = "yes"
//! keyprefix = "pbx1:"
//! hash = "fnv1a_32"
//!
//! [pool]
//! size = 8
//! acquire_timeout_us = 500
//! connect_timeout_ms = 1000
//! io_timeout_ms = 1000
//! ```

use crate::hash::HashAlgorithm;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Default memcached port
pub const DEFAULT_PORT: u16 = 11211;

/// Connect and socket I/O timeout used when none (or zero) is configured
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: StoreConfig,
    pub pool: PoolConfig,
}

/// Store options, read once at startup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Cluster endpoints, `host[:port]`; a single string or an array
    #[serde(deserialize_with = "deserialize_servers")]
    pub server: Vec<ServerAddr>,

    /// Default time-to-live in seconds (0 = never expire)
    #[serde(deserialize_with = "deserialize_ttl")]
    pub ttl: u32,

    /// Use the binary protocol (required by counters)
    #[serde(deserialize_with = "deserialize_truthy")]
    pub binary_proto: bool,

    /// Namespace prepended to every key
    #[serde(alias = "keynamespace")]
    pub keyprefix: String,

    /// Server selection hash
    pub hash: HashAlgorithm,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            server: Vec::new(),
            ttl: 0,
            binary_proto: true,
            keyprefix: String::new(),
            hash: HashAlgorithm::Default,
        }
    }
}

impl StoreConfig {
    /// Configured endpoints, or localhost when none were given
    pub fn servers(&self) -> Vec<ServerAddr> {
        if self.server.is_empty() {
            info!("No server configured, expecting memcached on 127.0.0.1:{DEFAULT_PORT}");
            return vec![ServerAddr::localhost()];
        }
        self.server.clone()
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of pooled handles, fixed for the process lifetime
    pub size: usize,

    /// Maximum wait for a free handle (microseconds)
    pub acquire_timeout_us: u64,

    /// TCP connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Socket read/write timeout (milliseconds)
    pub io_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 8,
            acquire_timeout_us: 500,
            connect_timeout_ms: DEFAULT_TIMEOUT_MS,
            io_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_micros(self.acquire_timeout_us)
    }

    /// Zero falls back to the default
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(non_zero_or_default(self.connect_timeout_ms))
    }

    /// Zero falls back to the default
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(non_zero_or_default(self.io_timeout_ms))
    }
}

/// A single `host:port` cluster endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn localhost() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

impl FromStr for ServerAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty server entry".to_string());
        }

        // [v6]:port, [v6], host:port, host
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| format!("unterminated IPv6 address: {s}"))?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => return Err(format!("invalid server entry: {s}")),
            }
        } else {
            match s.split_once(':') {
                Some((host, port)) if !port.contains(':') => (host, Some(port)),
                Some(_) => (s, None),
                None => (s, None),
            }
        };

        if host.is_empty() {
            return Err(format!("missing host in server entry: {s}"));
        }

        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| format!("invalid port in server entry: {s}"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::McdError::Config(format!("Failed to read config file: {e}"))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| crate::McdError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables or use defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(servers) = std::env::var("MCDCACHE_SERVERS") {
            config.general.server = servers
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| match s.parse() {
                    Ok(addr) => Some(addr),
                    Err(e) => {
                        warn!("Ignoring MCDCACHE_SERVERS entry: {e}");
                        None
                    }
                })
                .collect();
        }

        if let Ok(ttl) = std::env::var("MCDCACHE_TTL") {
            config.general.ttl = coerce_ttl(&ttl);
        }

        if let Ok(binary) = std::env::var("MCDCACHE_BINARY_PROTO") {
            config.general.binary_proto = is_truthy(&binary);
        }

        if let Ok(prefix) = std::env::var("MCDCACHE_KEYPREFIX") {
            config.general.keyprefix = prefix;
        }

        if let Ok(hash) = std::env::var("MCDCACHE_HASH") {
            config.general.hash = HashAlgorithm::from_name(&hash);
        }

        if let Ok(size) = std::env::var("MCDCACHE_POOL_SIZE")
            && let Ok(n) = size.parse::<usize>()
            && n > 0
        {
            config.pool.size = n;
        }

        config
    }

    fn validate(&self) -> crate::Result<()> {
        if self.pool.size == 0 {
            return Err(crate::McdError::Config(
                "pool.size must be at least 1".to_string(),
            ));
        }
        if self.pool.connect_timeout_ms == 0 {
            warn!("pool.connect_timeout_ms = 0 is not allowed, using {DEFAULT_TIMEOUT_MS}ms");
        }
        if self.pool.io_timeout_ms == 0 {
            warn!("pool.io_timeout_ms = 0 is not allowed, using {DEFAULT_TIMEOUT_MS}ms");
        }
        Ok(())
    }
}

fn non_zero_or_default(ms: u64) -> u64 {
    if ms == 0 { DEFAULT_TIMEOUT_MS } else { ms }
}

/// Truthiness the way the host's config parser reads it
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "y" | "t" | "1" | "on"
    )
}

fn coerce_ttl(value: &str) -> u32 {
    match value.trim().parse::<u32>() {
        Ok(ttl) => ttl,
        Err(_) => {
            warn!("ttl={value} is not numeric, using 0");
            0
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    Str(String),
}

fn deserialize_servers<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ServerAddr>, D::Error> {
    let entries = match OneOrMany::deserialize(d)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    };
    entries
        .iter()
        .map(|s| s.parse().map_err(serde::de::Error::custom))
        .collect()
}

fn deserialize_ttl<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(match IntOrString::deserialize(d)? {
        IntOrString::Int(n) => u32::try_from(n).unwrap_or_else(|_| {
            warn!("ttl={n} out of range, using 0");
            0
        }),
        IntOrString::Str(s) => coerce_ttl(&s),
    })
}

fn deserialize_truthy<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match BoolOrString::deserialize(d)? {
        BoolOrString::Bool(b) => b,
        BoolOrString::Str(s) => is_truthy(&s),
    })
}
