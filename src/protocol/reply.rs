//! Replies decoded from the store

use crate::ProtocolError;
use crate::result::ResultCode;

/// Outcome of one request as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Item data for a get
    Value(Vec<u8>),
    /// Counter value after incr/decr
    Numeric(u64),
    /// Stored or deleted
    Done,
    /// The store refused the request
    Failed(ResultCode),
}

/// Result of parsing
#[derive(Debug)]
pub enum ParseResult {
    /// Reply fully parsed, with the number of bytes consumed
    Complete(Reply, usize),
    /// Need more data to complete parsing
    NeedMoreData,
    /// Framing is broken; the connection cannot be reused
    Error(ProtocolError),
}
