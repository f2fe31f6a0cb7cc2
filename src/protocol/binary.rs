//! Memcached binary protocol, client side
//!
//! Every packet starts with a 24 byte big-endian header:
//! `magic opcode key_len(2) extras_len data_type vbucket|status(2)
//! body_len(4) opaque(4) cas(8)`, followed by extras, key and value.

use crate::ProtocolError;
use crate::protocol::command::{MAX_KEY_LENGTH, Request, StoreMode};
use crate::protocol::reply::{ParseResult, Reply};
use crate::result::ResultCode;
use bytes::{BufMut, BytesMut};

/// Fixed header size
pub const HEADER_LEN: usize = 24;

pub const REQUEST_MAGIC: u8 = 0x80;
pub const RESPONSE_MAGIC: u8 = 0x81;

/// Expiration that tells incr/decr not to create a missing counter
pub const NO_AUTO_CREATE: u32 = 0xffff_ffff;

/// Opcodes used by this client
pub mod opcode {
    pub const GET: u8 = 0x00;
    pub const SET: u8 = 0x01;
    pub const ADD: u8 = 0x02;
    pub const REPLACE: u8 = 0x03;
    pub const DELETE: u8 = 0x04;
    pub const INCREMENT: u8 = 0x05;
    pub const DECREMENT: u8 = 0x06;
    pub const APPEND: u8 = 0x0e;
}

/// Response status values
pub mod status {
    pub const NO_ERROR: u16 = 0x0000;
    pub const KEY_NOT_FOUND: u16 = 0x0001;
    pub const KEY_EXISTS: u16 = 0x0002;
    pub const VALUE_TOO_LARGE: u16 = 0x0003;
    pub const INVALID_ARGUMENTS: u16 = 0x0004;
    pub const ITEM_NOT_STORED: u16 = 0x0005;
    pub const NON_NUMERIC: u16 = 0x0006;
    pub const UNKNOWN_COMMAND: u16 = 0x0081;
    pub const OUT_OF_MEMORY: u16 = 0x0082;
}

/// Opcode carrying `request`
pub fn opcode_of(request: &Request<'_>) -> u8 {
    match request {
        Request::Get { .. } => opcode::GET,
        Request::Store { mode, .. } => match mode {
            StoreMode::Set => opcode::SET,
            StoreMode::Add => opcode::ADD,
            StoreMode::Replace => opcode::REPLACE,
            StoreMode::Append => opcode::APPEND,
        },
        Request::Delete { .. } => opcode::DELETE,
        Request::Incr { .. } | Request::IncrWithInitial { .. } => opcode::INCREMENT,
        Request::Decr { .. } => opcode::DECREMENT,
    }
}

/// Map a response status onto the result taxonomy
pub fn status_code(status: u16) -> ResultCode {
    match status {
        status::NO_ERROR => ResultCode::Success,
        status::KEY_NOT_FOUND => ResultCode::NotFound,
        status::KEY_EXISTS => ResultCode::DataExists,
        status::VALUE_TOO_LARGE => ResultCode::E2Big,
        status::INVALID_ARGUMENTS | status::NON_NUMERIC => ResultCode::InvalidArguments,
        status::ITEM_NOT_STORED => ResultCode::NotStored,
        status::UNKNOWN_COMMAND => ResultCode::NotSupported,
        status::OUT_OF_MEMORY => ResultCode::MemoryAllocationFailure,
        _ => ResultCode::ServerError,
    }
}

/// Encode a request packet
pub fn encode(request: &Request<'_>, opaque: u32, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let key = request.key();
    if key.len() > MAX_KEY_LENGTH {
        return Err(ProtocolError::InvalidKey);
    }

    let (extras_len, value): (u8, &[u8]) = match *request {
        Request::Store {
            mode: StoreMode::Append,
            data,
            ..
        } => (0, data),
        Request::Store { data, .. } => (8, data),
        Request::Incr { .. } | Request::Decr { .. } | Request::IncrWithInitial { .. } => (20, &[]),
        Request::Get { .. } | Request::Delete { .. } => (0, &[]),
    };
    let body_len = usize::from(extras_len) + key.len() + value.len();
    let body_len = u32::try_from(body_len).map_err(|_| ProtocolError::InvalidBytesLength)?;

    buf.reserve(HEADER_LEN + body_len as usize);
    buf.put_u8(REQUEST_MAGIC);
    buf.put_u8(opcode_of(request));
    buf.put_u16(key.len() as u16);
    buf.put_u8(extras_len);
    buf.put_u8(0); // raw bytes
    buf.put_u16(0); // vbucket
    buf.put_u32(body_len);
    buf.put_u32(opaque);
    buf.put_u64(0); // cas

    match *request {
        Request::Store {
            mode, flags, exptime, ..
        } if mode != StoreMode::Append => {
            buf.put_u32(flags);
            buf.put_u32(exptime);
        }
        Request::Incr { delta, .. } | Request::Decr { delta, .. } => {
            buf.put_u64(delta);
            buf.put_u64(0);
            buf.put_u32(NO_AUTO_CREATE);
        }
        Request::IncrWithInitial {
            delta,
            initial,
            exptime,
            ..
        } => {
            buf.put_u64(delta);
            buf.put_u64(initial);
            buf.put_u32(exptime);
        }
        _ => {}
    }

    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    Ok(())
}

/// Parse the response packet for `request` from the front of `buf`
pub fn parse(buf: &[u8], request: &Request<'_>, opaque: u32) -> ParseResult {
    if buf.len() < HEADER_LEN {
        return ParseResult::NeedMoreData;
    }

    if buf[0] != RESPONSE_MAGIC {
        return ParseResult::Error(ProtocolError::BadMagic(buf[0]));
    }

    let key_len = usize::from(u16::from_be_bytes([buf[2], buf[3]]));
    let extras_len = usize::from(buf[4]);
    let status = u16::from_be_bytes([buf[6], buf[7]]);
    let body_len = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;
    let actual_opaque = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);

    let total = HEADER_LEN + body_len;
    if buf.len() < total {
        return ParseResult::NeedMoreData;
    }

    if buf[1] != opcode_of(request) {
        return ParseResult::Error(ProtocolError::UnexpectedReply(format!(
            "opcode {:#04x} in reply to {}",
            buf[1],
            request.name()
        )));
    }
    if actual_opaque != opaque {
        return ParseResult::Error(ProtocolError::OpaqueMismatch {
            expected: opaque,
            actual: actual_opaque,
        });
    }
    if extras_len + key_len > body_len {
        return ParseResult::Error(ProtocolError::InvalidBytesLength);
    }

    if status != status::NO_ERROR {
        return ParseResult::Complete(Reply::Failed(status_code(status)), total);
    }

    let body = &buf[HEADER_LEN..total];
    let reply = match request {
        Request::Get { .. } => Reply::Value(body[extras_len + key_len..].to_vec()),
        Request::Incr { .. } | Request::Decr { .. } | Request::IncrWithInitial { .. } => {
            let value = &body[extras_len + key_len..];
            match <[u8; 8]>::try_from(value) {
                Ok(bytes) => Reply::Numeric(u64::from_be_bytes(bytes)),
                Err(_) => return ParseResult::Error(ProtocolError::InvalidBytesLength),
            }
        }
        Request::Store { .. } | Request::Delete { .. } => Reply::Done,
    };

    ParseResult::Complete(reply, total)
}
