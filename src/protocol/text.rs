//! Memcached ASCII protocol, client side
//!
//! Requests are written with `itoa` into a reusable buffer; replies are
//! parsed in two phases: the status line, then (for `VALUE`) the data
//! block and its trailing `END`.

use crate::ProtocolError;
use crate::protocol::command::{Request, is_valid_text_key};
use crate::protocol::reply::{ParseResult, Reply};
use crate::result::ResultCode;
use bytes::BytesMut;
use itoa::Buffer;

/// Encode a request into the ASCII wire format
pub fn encode(request: &Request<'_>, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    if !is_valid_text_key(request.key()) {
        return Err(ProtocolError::InvalidKey);
    }

    let mut itoa_buf = Buffer::new();
    match *request {
        Request::Get { key } => {
            buf.extend_from_slice(b"get ");
            buf.extend_from_slice(key);
        }
        Request::Store {
            mode,
            key,
            flags,
            exptime,
            data,
        } => {
            buf.extend_from_slice(mode.name().as_bytes());
            buf.extend_from_slice(b" ");
            buf.extend_from_slice(key);
            buf.extend_from_slice(b" ");
            buf.extend_from_slice(itoa_buf.format(flags).as_bytes());
            buf.extend_from_slice(b" ");
            buf.extend_from_slice(itoa_buf.format(exptime).as_bytes());
            buf.extend_from_slice(b" ");
            buf.extend_from_slice(itoa_buf.format(data.len()).as_bytes());
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(data);
        }
        Request::Delete { key } => {
            buf.extend_from_slice(b"delete ");
            buf.extend_from_slice(key);
        }
        // Only a text-mode ClusterHandle sends these; CacheClient counters need binary
        Request::Incr { key, delta } | Request::Decr { key, delta } => {
            buf.extend_from_slice(request.name().as_bytes());
            buf.extend_from_slice(b" ");
            buf.extend_from_slice(key);
            buf.extend_from_slice(b" ");
            buf.extend_from_slice(itoa_buf.format(delta).as_bytes());
        }
        Request::IncrWithInitial { .. } => {
            return Err(ProtocolError::Unsupported("increment with initial value"));
        }
    }
    buf.extend_from_slice(b"\r\n");
    Ok(())
}

/// Parse the reply to `request` from the front of `buf`
pub fn parse(buf: &[u8], request: &Request<'_>) -> ParseResult {
    let line_end = match find_crlf(buf) {
        Some(pos) => pos,
        None => return ParseResult::NeedMoreData,
    };
    let line = &buf[..line_end];
    let consumed = line_end + 2;

    // Error lines can answer any command
    if line == b"ERROR" {
        return ParseResult::Complete(Reply::Failed(ResultCode::ProtocolError), consumed);
    }
    if line.starts_with(b"CLIENT_ERROR") {
        return ParseResult::Complete(Reply::Failed(ResultCode::ClientError), consumed);
    }
    if line.starts_with(b"SERVER_ERROR") {
        return ParseResult::Complete(Reply::Failed(ResultCode::ServerError), consumed);
    }

    match request {
        Request::Get { .. } => parse_get(buf, line, consumed),
        Request::Store { .. } => match line {
            b"STORED" => ParseResult::Complete(Reply::Done, consumed),
            b"NOT_STORED" => ParseResult::Complete(Reply::Failed(ResultCode::NotStored), consumed),
            b"EXISTS" => ParseResult::Complete(Reply::Failed(ResultCode::DataExists), consumed),
            b"NOT_FOUND" => ParseResult::Complete(Reply::Failed(ResultCode::NotFound), consumed),
            _ => unexpected(line),
        },
        Request::Delete { .. } => match line {
            b"DELETED" => ParseResult::Complete(Reply::Done, consumed),
            b"NOT_FOUND" => ParseResult::Complete(Reply::Failed(ResultCode::NotFound), consumed),
            _ => unexpected(line),
        },
        Request::Incr { .. } | Request::Decr { .. } => match line {
            b"NOT_FOUND" => ParseResult::Complete(Reply::Failed(ResultCode::NotFound), consumed),
            // decr may leave trailing spaces where digits used to be
            _ => match parse_u64(line.trim_ascii_end()) {
                Some(n) => ParseResult::Complete(Reply::Numeric(n), consumed),
                None => unexpected(line),
            },
        },
        Request::IncrWithInitial { .. } => {
            ParseResult::Error(ProtocolError::Unsupported("increment with initial value"))
        }
    }
}

/// Parse `VALUE <key> <flags> <bytes> [<cas>]\r\n<data>\r\nEND\r\n` or `END\r\n`
fn parse_get(buf: &[u8], line: &[u8], line_consumed: usize) -> ParseResult {
    if line == b"END" {
        return ParseResult::Complete(Reply::Failed(ResultCode::NotFound), line_consumed);
    }

    let mut parts = line.split(|&b| b == b' ');
    if parts.next() != Some(b"VALUE".as_slice()) {
        return unexpected(line);
    }
    let _key = parts.next();
    if parts.next().and_then(parse_u32).is_none() {
        return ParseResult::Error(ProtocolError::InvalidNumericValue);
    }
    let bytes = match parts.next().and_then(parse_usize) {
        Some(b) => b,
        None => return ParseResult::Error(ProtocolError::InvalidBytesLength),
    };

    let data_start = line_consumed;
    let Some(data_end) = data_start.checked_add(bytes) else {
        return ParseResult::Error(ProtocolError::InvalidBytesLength);
    };
    let Some(total_needed) = data_end.checked_add(2 + b"END\r\n".len()) else {
        return ParseResult::Error(ProtocolError::InvalidBytesLength);
    };

    if buf.len() < total_needed {
        return ParseResult::NeedMoreData;
    }

    if &buf[data_end..data_end + 2] != b"\r\n" || &buf[data_end + 2..total_needed] != b"END\r\n" {
        return ParseResult::Error(ProtocolError::UnexpectedData);
    }

    ParseResult::Complete(Reply::Value(buf[data_start..data_end].to_vec()), total_needed)
}

fn unexpected(line: &[u8]) -> ParseResult {
    ParseResult::Error(ProtocolError::UnexpectedReply(
        String::from_utf8_lossy(line).to_string(),
    ))
}

/// Find \r\n in buffer
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    memchr::memmem::find(buf, b"\r\n")
}

fn parse_u32(s: &[u8]) -> Option<u32> {
    std::str::from_utf8(s).ok()?.parse().ok()
}

fn parse_u64(s: &[u8]) -> Option<u64> {
    std::str::from_utf8(s).ok()?.parse().ok()
}

fn parse_usize(s: &[u8]) -> Option<usize> {
    std::str::from_utf8(s).ok()?.parse().ok()
}
