//! Time-to-live resolution
//!
//! Precedence: explicit per-call TTL, then the caller-scoped override
//! (when numeric), then the configured default, then 0 (never expire).

use tracing::{debug, warn};

/// TTL inputs supplied by the caller for one write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ttl<'a> {
    /// Explicit per-call TTL in seconds
    pub explicit: Option<u32>,
    /// Raw caller-scoped override (e.g. the `MCDTTL` channel variable)
    pub scoped: Option<&'a str>,
}

impl<'a> Ttl<'a> {
    pub fn explicit(seconds: u32) -> Self {
        Self {
            explicit: Some(seconds),
            scoped: None,
        }
    }

    pub fn scoped(raw: &'a str) -> Self {
        Self {
            explicit: None,
            scoped: Some(raw),
        }
    }

    /// Resolve against the configured default (0 when none is configured)
    pub fn resolve(&self, default: u32) -> u32 {
        if let Some(ttl) = self.explicit {
            debug!(ttl, "using explicit ttl");
            return ttl;
        }

        if let Some(raw) = self.scoped {
            match raw.trim().parse::<u32>() {
                Ok(ttl) => {
                    debug!(ttl, "using caller-scoped ttl override");
                    return ttl;
                }
                Err(_) => {
                    warn!("ttl override {raw:?} is not numeric, ignoring it");
                }
            }
        }

        debug!(ttl = default, "using default ttl");
        default
    }
}
