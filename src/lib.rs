//! # mcdcache
//!
//! Pooled memcached client that exposes cache operations to a
//! call-processing host.
//!
//! ## Features
//!
//! - get, set, add, replace, append and delete over a fixed-size handle pool
//! - Atomic counters (initialize, increment, decrement, read) on the binary protocol
//! - Key namespacing with the protocol's 250-byte key limit enforced locally
//! - TTL precedence: explicit, then the caller's `MCDTTL`, then the configured default
//! - One integer result code per operation, store codes passed through unchanged
//! - ASCII and binary memcached protocols, modula server selection over the cluster
//! - Prometheus metrics
//!
//! ## Example
//!
//! ```ignore
//! use mcdcache::config::Config;
//! use mcdcache::client::CacheClient;
//! use mcdcache::ttl::Ttl;
//!
//! let config = Config::from_file("mcdcache.toml")?;
//! let client = CacheClient::connect(&config);
//! client.set("caller", b"5551234", Ttl::default())?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────────────┐   ┌────────────┐
//! │ host       │──▶│ mcdcache                     │──▶│ memcached  │
//! │ (channel   │   │  ├─ key builder / TTL chain  │   │ cluster    │
//! │ variables) │   │  ├─ handle pool (timeout)    │   │            │
//! └────────────┘   │  └─ text / binary protocol   │   └────────────┘
//!                  └──────────────────────────────┘
//! ```

// Modules
pub mod client;
pub mod config;
pub mod error;
pub mod hash;
pub mod host;
pub mod key;
pub mod metrics;
pub mod pool;
pub mod prelude;
pub mod protocol;
pub mod result;
pub mod store;
pub mod ttl;

// Re-exports for convenience
pub use client::CacheClient;
pub use error::{McdError, ProtocolError, Result};
pub use result::{OpResult, ResultCode};
