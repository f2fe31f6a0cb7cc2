//! A single blocking connection to one memcached server

use crate::config::{DEFAULT_TIMEOUT_MS, ServerAddr};
use crate::error::McdError;
use crate::protocol::{ParseResult, ProtocolMode, Reply, Request};
use bytes::BytesMut;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

const READ_CHUNK: usize = 8192;

fn bounded(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        Duration::from_millis(DEFAULT_TIMEOUT_MS)
    } else {
        timeout
    }
}

/// TCP connection with reusable request/reply buffers
pub struct Connection {
    stream: TcpStream,
    mode: ProtocolMode,
    read_buf: BytesMut,
    write_buf: BytesMut,
    opaque: u32,
}

impl Connection {
    /// Resolve and connect, applying socket timeouts (a zero timeout uses
    /// `DEFAULT_TIMEOUT_MS`)
    pub fn connect(
        addr: &ServerAddr,
        mode: ProtocolMode,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self, McdError> {
        let connect_timeout = bounded(connect_timeout);
        let io_timeout = bounded(io_timeout);
        let candidates: Vec<SocketAddr> = (addr.host.as_str(), addr.port)
            .to_socket_addrs()
            .map_err(|e| McdError::HostLookup(format!("{addr}: {e}")))?
            .collect();
        if candidates.is_empty() {
            return Err(McdError::HostLookup(format!("{addr}: no addresses")));
        }

        let mut last_err = None;
        let mut connected = None;
        for candidate in &candidates {
            match TcpStream::connect_timeout(candidate, connect_timeout) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let stream = match connected {
            Some(stream) => stream,
            None => {
                let err = last_err
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no address"));
                return Err(McdError::Connect(err));
            }
        };

        stream.set_read_timeout(Some(io_timeout))?;
        stream.set_write_timeout(Some(io_timeout))?;
        // Disable Nagle
        stream.set_nodelay(true)?;

        debug!(server = %addr, ?mode, "connected to memcached");
        Ok(Self {
            stream,
            mode,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            write_buf: BytesMut::with_capacity(512),
            opaque: 0,
        })
    }

    /// Send one request and wait for its reply
    pub fn execute(&mut self, request: &Request<'_>) -> Result<Reply, McdError> {
        self.opaque = self.opaque.wrapping_add(1);
        self.write_buf.clear();
        self.read_buf.clear();

        self.mode.encode(request, self.opaque, &mut self.write_buf)?;
        self.stream
            .write_all(&self.write_buf)
            .and_then(|()| self.stream.flush())
            .map_err(McdError::Write)?;

        loop {
            match self.mode.parse(&self.read_buf, request, self.opaque) {
                ParseResult::Complete(reply, consumed) => {
                    let _ = self.read_buf.split_to(consumed);
                    return Ok(reply);
                }
                ParseResult::NeedMoreData => self.fill()?,
                ParseResult::Error(e) => return Err(e.into()),
            }
        }
    }

    fn fill(&mut self) -> Result<(), McdError> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut chunk)?;
        if n == 0 {
            return Err(McdError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }
        self.read_buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }
}
