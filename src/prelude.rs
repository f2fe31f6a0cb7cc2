//! Prelude module for common imports.
//!
//! # Usage
//!
//! ```ignore
//! use mcdcache::prelude::*;
//! ```

// Error types
pub use crate::error::{McdError, ProtocolError, Result};
pub use crate::result::{OpResult, ResultCode};

// Configuration
pub use crate::config::{Config, PoolConfig, ServerAddr, StoreConfig};

// Client
pub use crate::client::{CacheClient, MAX_VALUE_LENGTH};
pub use crate::host::{Channel, Functions, Variables};
pub use crate::store::{ClusterHandle, Store};
pub use crate::ttl::Ttl;

// Protocol
pub use crate::protocol::{ProtocolMode, StoreMode};

// Metrics
pub use crate::metrics::Metrics;

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};
