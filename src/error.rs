//! Error types for mcdcache

use crate::result::ResultCode;
use std::io::ErrorKind;
use thiserror::Error;

/// Main error type for initialization and connection plumbing
#[derive(Error, Debug)]
pub enum McdError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Host lookup failed: {0}")]
    HostLookup(String),

    #[error("Connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl McdError {
    /// Classify into the store band of the result taxonomy
    pub fn result_code(&self) -> ResultCode {
        match self {
            McdError::Protocol(ProtocolError::Unsupported(_)) => ResultCode::NotSupported,
            McdError::Protocol(ProtocolError::InvalidKey) => ResultCode::BadKeyProvided,
            McdError::Protocol(_) => ResultCode::ProtocolError,
            McdError::HostLookup(_) => ResultCode::HostLookupFailure,
            McdError::Connect(e) if is_timeout(e) => ResultCode::Timeout,
            McdError::Connect(_) => ResultCode::ConnectionFailure,
            McdError::Write(e) if is_timeout(e) => ResultCode::Timeout,
            McdError::Write(_) => ResultCode::WriteFailure,
            McdError::Io(e) if is_timeout(e) => ResultCode::Timeout,
            McdError::Io(e) if e.kind() == ErrorKind::UnexpectedEof => ResultCode::ReadFailure,
            McdError::Io(_) => ResultCode::UnknownReadFailure,
            McdError::Config(_) => ResultCode::Failure,
        }
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

/// Reply parsing and request encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Bad magic byte: {0:#04x}")]
    BadMagic(u8),

    #[error("Opaque mismatch (expected {expected}, got {actual})")]
    OpaqueMismatch { expected: u32, actual: u32 },

    #[error("Invalid numeric value")]
    InvalidNumericValue,

    #[error("Invalid bytes length")]
    InvalidBytesLength,

    #[error("Key contains whitespace or control characters")]
    InvalidKey,

    #[error("Unexpected data")]
    UnexpectedData,

    #[error("Not supported by this protocol: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, McdError>;
