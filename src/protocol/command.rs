//! Requests the client sends to the store

/// Maximum key length the memcached protocols accept
pub const MAX_KEY_LENGTH: usize = 250;

/// Storage command variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Unconditional upsert
    Set,
    /// Only if absent
    Add,
    /// Only if present
    Replace,
    /// Concatenate onto an existing value
    Append,
}

impl StoreMode {
    pub fn name(self) -> &'static str {
        match self {
            StoreMode::Set => "set",
            StoreMode::Add => "add",
            StoreMode::Replace => "replace",
            StoreMode::Append => "append",
        }
    }
}

/// A single request against one physical key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    /// get <key>
    Get { key: &'a [u8] },

    /// set|add|replace|append <key> <flags> <exptime> <bytes>
    Store {
        mode: StoreMode,
        key: &'a [u8],
        flags: u32,
        exptime: u32,
        data: &'a [u8],
    },

    /// delete <key>
    Delete { key: &'a [u8] },

    /// incr <key> <delta>, fails on a missing key
    Incr { key: &'a [u8], delta: u64 },

    /// decr <key> <delta>, fails on a missing key
    Decr { key: &'a [u8], delta: u64 },

    /// Binary-only increment that creates the counter with `initial` when absent
    IncrWithInitial {
        key: &'a [u8],
        delta: u64,
        initial: u64,
        exptime: u32,
    },
}

impl<'a> Request<'a> {
    pub fn key(&self) -> &'a [u8] {
        match self {
            Request::Get { key }
            | Request::Store { key, .. }
            | Request::Delete { key }
            | Request::Incr { key, .. }
            | Request::Decr { key, .. }
            | Request::IncrWithInitial { key, .. } => key,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Request::Get { .. } => "get",
            Request::Store { mode, .. } => mode.name(),
            Request::Delete { .. } => "delete",
            Request::Incr { .. } => "incr",
            Request::Decr { .. } => "decr",
            Request::IncrWithInitial { .. } => "incr_with_initial",
        }
    }
}

/// Check if a key can travel over the ASCII protocol
pub fn is_valid_text_key(key: &[u8]) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return false;
    }
    // Keys cannot contain control characters or whitespace
    key.iter().all(|&b| b > 32 && b != 127)
}
