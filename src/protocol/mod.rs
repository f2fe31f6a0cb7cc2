//! Memcached wire protocols, client side
//!
//! Both codecs share the same request/reply types and the same two-phase
//! reply parsing: feed the buffered bytes, get back either a complete
//! reply with the number of bytes consumed or a request for more data.

pub mod binary;
pub mod command;
pub mod reply;
pub mod text;

pub use command::{MAX_KEY_LENGTH, Request, StoreMode, is_valid_text_key};
pub use reply::{ParseResult, Reply};

use crate::ProtocolError;
use bytes::BytesMut;

/// Wire protocol spoken with the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMode {
    Text,
    Binary,
}

impl ProtocolMode {
    pub fn from_binary_flag(binary: bool) -> Self {
        if binary { Self::Binary } else { Self::Text }
    }

    /// Append the encoded request to `buf`
    pub fn encode(
        self,
        request: &Request<'_>,
        opaque: u32,
        buf: &mut BytesMut,
    ) -> Result<(), ProtocolError> {
        match self {
            Self::Text => text::encode(request, buf),
            Self::Binary => binary::encode(request, opaque, buf),
        }
    }

    /// Try to parse the reply to `request` from the front of `buf`
    pub fn parse(self, buf: &[u8], request: &Request<'_>, opaque: u32) -> ParseResult {
        match self {
            Self::Text => text::parse(buf, request),
            Self::Binary => binary::parse(buf, request, opaque),
        }
    }
}
