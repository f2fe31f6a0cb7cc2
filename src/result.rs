//! Operation result codes surfaced to the caller
//!
//! Three bands share one integer space:
//! - store band: the memcached client's native codes (0..=42), passed through
//! - local band: conditions refused before the store is contacted (122..=127)
//! - generic: `Failure` (1) for anything not classified otherwise

use std::fmt;

/// Result of a client operation. The error side is never `ResultCode::Success`.
pub type OpResult<T> = Result<T, ResultCode>;

/// Lowest code of the locally synthesized band
pub const LOCAL_BAND_START: i32 = 122;

/// Which part of the code space a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultBand {
    Success,
    Store,
    Local,
    Generic,
}

/// Result codes, numerically compatible with libmemcached's `memcached_return_t`
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success = 0,
    Failure = 1,
    HostLookupFailure = 2,
    ConnectionFailure = 3,
    ConnectionBindFailure = 4,
    WriteFailure = 5,
    ReadFailure = 6,
    UnknownReadFailure = 7,
    ProtocolError = 8,
    ClientError = 9,
    ServerError = 10,
    ConnectionSocketCreateFailure = 11,
    DataExists = 12,
    DataDoesNotExist = 13,
    NotStored = 14,
    Stored = 15,
    NotFound = 16,
    MemoryAllocationFailure = 17,
    PartialRead = 18,
    SomeErrors = 19,
    NoServers = 20,
    End = 21,
    Deleted = 22,
    Value = 23,
    Stat = 24,
    Item = 25,
    Errno = 26,
    FailUnixSocket = 27,
    NotSupported = 28,
    NoKeyProvided = 29,
    FetchNotFinished = 30,
    Timeout = 31,
    Buffered = 32,
    BadKeyProvided = 33,
    InvalidHostProtocol = 34,
    ServerMarkedDead = 35,
    UnknownStatKey = 36,
    E2Big = 37,
    InvalidArguments = 38,
    KeyTooBig = 39,
    AuthProblem = 40,
    AuthFailure = 41,
    AuthContinue = 42,

    // Locally synthesized, never returned by the store
    PoolAcquireTimeout = 122,
    BinaryProtocolRequired = 123,
    BadIncrement = 124,
    ValueTooLong = 125,
    KeyTooLong = 126,
    ArgumentNeeded = 127,
}

impl ResultCode {
    const STORE_CODES: [ResultCode; 43] = [
        Self::Success,
        Self::Failure,
        Self::HostLookupFailure,
        Self::ConnectionFailure,
        Self::ConnectionBindFailure,
        Self::WriteFailure,
        Self::ReadFailure,
        Self::UnknownReadFailure,
        Self::ProtocolError,
        Self::ClientError,
        Self::ServerError,
        Self::ConnectionSocketCreateFailure,
        Self::DataExists,
        Self::DataDoesNotExist,
        Self::NotStored,
        Self::Stored,
        Self::NotFound,
        Self::MemoryAllocationFailure,
        Self::PartialRead,
        Self::SomeErrors,
        Self::NoServers,
        Self::End,
        Self::Deleted,
        Self::Value,
        Self::Stat,
        Self::Item,
        Self::Errno,
        Self::FailUnixSocket,
        Self::NotSupported,
        Self::NoKeyProvided,
        Self::FetchNotFinished,
        Self::Timeout,
        Self::Buffered,
        Self::BadKeyProvided,
        Self::InvalidHostProtocol,
        Self::ServerMarkedDead,
        Self::UnknownStatKey,
        Self::E2Big,
        Self::InvalidArguments,
        Self::KeyTooBig,
        Self::AuthProblem,
        Self::AuthFailure,
        Self::AuthContinue,
    ];

    /// Integer value handed to the host
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look up a code by its integer value
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0..=42 => Some(Self::STORE_CODES[code as usize]),
            122 => Some(Self::PoolAcquireTimeout),
            123 => Some(Self::BinaryProtocolRequired),
            124 => Some(Self::BadIncrement),
            125 => Some(Self::ValueTooLong),
            126 => Some(Self::KeyTooLong),
            127 => Some(Self::ArgumentNeeded),
            _ => None,
        }
    }

    /// Collapse an operation result into the single code reported to the caller
    pub fn of<T>(result: &OpResult<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(code) => *code,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// True for codes the client produced without contacting the store
    pub fn is_local(self) -> bool {
        self.code() >= LOCAL_BAND_START
    }

    pub fn band(self) -> ResultBand {
        match self {
            Self::Success => ResultBand::Success,
            Self::Failure => ResultBand::Generic,
            code if code.is_local() => ResultBand::Local,
            _ => ResultBand::Store,
        }
    }

    /// Human readable description
    pub fn description(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::HostLookupFailure => "HOSTNAME LOOKUP FAILURE",
            Self::ConnectionFailure => "CONNECTION FAILURE",
            Self::ConnectionBindFailure => "CONNECTION BIND FAILURE",
            Self::WriteFailure => "WRITE FAILURE",
            Self::ReadFailure => "READ FAILURE",
            Self::UnknownReadFailure => "UNKNOWN READ FAILURE",
            Self::ProtocolError => "PROTOCOL ERROR",
            Self::ClientError => "CLIENT ERROR",
            Self::ServerError => "SERVER ERROR",
            Self::ConnectionSocketCreateFailure => "CONNECTION SOCKET CREATE FAILURE",
            Self::DataExists => "CONNECTION DATA EXISTS",
            Self::DataDoesNotExist => "CONNECTION DATA DOES NOT EXIST",
            Self::NotStored => "NOT STORED",
            Self::Stored => "STORED",
            Self::NotFound => "NOT FOUND",
            Self::MemoryAllocationFailure => "MEMORY ALLOCATION FAILURE",
            Self::PartialRead => "PARTIAL READ",
            Self::SomeErrors => "SOME ERRORS WERE REPORTED",
            Self::NoServers => "NO SERVERS DEFINED",
            Self::End => "SERVER END",
            Self::Deleted => "SERVER DELETE",
            Self::Value => "SERVER VALUE",
            Self::Stat => "STAT VALUE",
            Self::Item => "ITEM VALUE",
            Self::Errno => "SYSTEM ERROR",
            Self::FailUnixSocket => "COULD NOT OPEN UNIX SOCKET",
            Self::NotSupported => "ACTION NOT SUPPORTED",
            Self::NoKeyProvided => "A KEY LENGTH OF ZERO WAS PROVIDED",
            Self::FetchNotFinished => "FETCH WAS NOT COMPLETED",
            Self::Timeout => "A TIMEOUT OCCURRED",
            Self::Buffered => "ACTION QUEUED",
            Self::BadKeyProvided => "A BAD KEY WAS PROVIDED/CHARACTERS OUT OF RANGE",
            Self::InvalidHostProtocol => "THE HOST TRANSPORT PROTOCOL DOES NOT MATCH",
            Self::ServerMarkedDead => "SERVER IS MARKED DEAD",
            Self::UnknownStatKey => "ENCOUNTERED AN UNKNOWN STAT KEY",
            Self::E2Big => "ITEM TOO BIG",
            Self::InvalidArguments => "INVALID ARGUMENTS",
            Self::KeyTooBig => "KEY RETURNED FROM SERVER WAS TOO LARGE",
            Self::AuthProblem => "FAILED TO SEND AUTHENTICATION TO SERVER",
            Self::AuthFailure => "AUTHENTICATION FAILURE",
            Self::AuthContinue => "CONTINUE AUTHENTICATION",
            Self::PoolAcquireTimeout => "TIMED OUT WAITING FOR A POOLED CONNECTION",
            Self::BinaryProtocolRequired => "BINARY PROTOCOL REQUIRED",
            Self::BadIncrement => "INCREMENT IS NOT AN INTEGER",
            Self::ValueTooLong => "VALUE TOO LONG",
            Self::KeyTooLong => "KEY TOO LONG",
            Self::ArgumentNeeded => "ARGUMENT NEEDED",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_codes_are_indexed_by_value() {
        for (i, code) in ResultCode::STORE_CODES.iter().enumerate() {
            assert_eq!(code.code(), i as i32);
        }
    }

    #[test]
    fn test_from_code() {
        assert_eq!(ResultCode::from_code(0), Some(ResultCode::Success));
        assert_eq!(ResultCode::from_code(14), Some(ResultCode::NotStored));
        assert_eq!(ResultCode::from_code(16), Some(ResultCode::NotFound));
        assert_eq!(ResultCode::from_code(122), Some(ResultCode::PoolAcquireTimeout));
        assert_eq!(ResultCode::from_code(127), Some(ResultCode::ArgumentNeeded));
        assert_eq!(ResultCode::from_code(43), None);
        assert_eq!(ResultCode::from_code(-1), None);
    }

    #[test]
    fn test_bands_are_disjoint() {
        for code in ResultCode::STORE_CODES {
            assert!(!code.is_local());
        }
        for code in [
            ResultCode::PoolAcquireTimeout,
            ResultCode::BinaryProtocolRequired,
            ResultCode::BadIncrement,
            ResultCode::ValueTooLong,
            ResultCode::KeyTooLong,
            ResultCode::ArgumentNeeded,
        ] {
            assert_eq!(code.band(), ResultBand::Local);
        }
        assert_eq!(ResultCode::Success.band(), ResultBand::Success);
        assert_eq!(ResultCode::Failure.band(), ResultBand::Generic);
        assert_eq!(ResultCode::NotFound.band(), ResultBand::Store);
    }

    #[test]
    fn test_of() {
        let ok: OpResult<u64> = Ok(3);
        let err: OpResult<u64> = Err(ResultCode::KeyTooLong);
        assert_eq!(ResultCode::of(&ok), ResultCode::Success);
        assert_eq!(ResultCode::of(&err).code(), 126);
    }

    #[test]
    fn test_display() {
        assert_eq!(ResultCode::NotFound.to_string(), "16 (NOT FOUND)");
    }
}
