//! Cluster handle: one pooled session spanning every configured server

use super::{Connection, Store};
use crate::config::{Config, ServerAddr};
use crate::error::{McdError, ProtocolError};
use crate::hash::HashAlgorithm;
use crate::protocol::{ProtocolMode, Reply, Request, StoreMode};
use crate::result::{OpResult, ResultCode};
use std::time::Duration;
use tracing::warn;

struct ServerSlot {
    addr: ServerAddr,
    conn: Option<Connection>,
}

/// Session over the whole cluster, owning at most one connection per server.
///
/// Connections are opened on first use and discarded after any I/O or
/// framing failure, so the next request reconnects.
pub struct ClusterHandle {
    servers: Vec<ServerSlot>,
    hash: HashAlgorithm,
    mode: ProtocolMode,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ClusterHandle {
    pub fn new(config: &Config) -> Self {
        Self::with_servers(
            config.general.servers(),
            config.general.hash,
            ProtocolMode::from_binary_flag(config.general.binary_proto),
            config.pool.connect_timeout(),
            config.pool.io_timeout(),
        )
    }

    pub fn with_servers(
        servers: Vec<ServerAddr>,
        hash: HashAlgorithm,
        mode: ProtocolMode,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Self {
        Self {
            servers: servers
                .into_iter()
                .map(|addr| ServerSlot { addr, conn: None })
                .collect(),
            hash,
            mode,
            connect_timeout,
            io_timeout,
        }
    }

    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    /// Number of servers with an open connection
    pub fn connected(&self) -> usize {
        self.servers.iter().filter(|s| s.conn.is_some()).count()
    }

    fn execute(&mut self, request: &Request<'_>) -> OpResult<Reply> {
        if self.servers.is_empty() {
            return Err(ResultCode::NoServers);
        }

        let index = self.hash.server_index(request.key(), self.servers.len());
        let slot = &mut self.servers[index];

        if slot.conn.is_none() {
            let conn = Connection::connect(&slot.addr, self.mode, self.connect_timeout, self.io_timeout)
                .map_err(|e| {
                    warn!(server = %slot.addr, "memcached connect failed: {e}");
                    e.result_code()
                })?;
            slot.conn = Some(conn);
        }
        let Some(conn) = slot.conn.as_mut() else {
            return Err(ResultCode::ConnectionFailure);
        };

        match conn.execute(request) {
            Ok(Reply::Failed(code)) => Err(code),
            Ok(reply) => Ok(reply),
            Err(e) => {
                if !is_request_error(&e) {
                    // The stream may hold half a reply; start over next time.
                    slot.conn = None;
                }
                warn!(server = %slot.addr, command = request.name(), "memcached request failed: {e}");
                Err(e.result_code())
            }
        }
    }
}

/// Errors raised while encoding, before anything touched the socket
fn is_request_error(e: &McdError) -> bool {
    matches!(
        e,
        McdError::Protocol(ProtocolError::InvalidKey | ProtocolError::Unsupported(_))
    )
}

fn unexpected(command: &str, reply: &Reply) -> ResultCode {
    warn!(command, ?reply, "unexpected reply kind");
    ResultCode::ProtocolError
}

impl Store for ClusterHandle {
    fn get(&mut self, key: &[u8]) -> OpResult<Vec<u8>> {
        match self.execute(&Request::Get { key })? {
            Reply::Value(data) => Ok(data),
            other => Err(unexpected("get", &other)),
        }
    }

    fn store(&mut self, mode: StoreMode, key: &[u8], value: &[u8], exptime: u32) -> OpResult<()> {
        let request = Request::Store {
            mode,
            key,
            flags: 0,
            exptime,
            data: value,
        };
        match self.execute(&request)? {
            Reply::Done => Ok(()),
            other => Err(unexpected(mode.name(), &other)),
        }
    }

    fn delete(&mut self, key: &[u8]) -> OpResult<()> {
        match self.execute(&Request::Delete { key })? {
            Reply::Done => Ok(()),
            other => Err(unexpected("delete", &other)),
        }
    }

    fn increment(&mut self, key: &[u8], delta: u64) -> OpResult<u64> {
        match self.execute(&Request::Incr { key, delta })? {
            Reply::Numeric(value) => Ok(value),
            other => Err(unexpected("incr", &other)),
        }
    }

    fn decrement(&mut self, key: &[u8], delta: u64) -> OpResult<u64> {
        match self.execute(&Request::Decr { key, delta })? {
            Reply::Numeric(value) => Ok(value),
            other => Err(unexpected("decr", &other)),
        }
    }

    fn increment_with_initial(
        &mut self,
        key: &[u8],
        delta: u64,
        initial: u64,
        exptime: u32,
    ) -> OpResult<u64> {
        let request = Request::IncrWithInitial {
            key,
            delta,
            initial,
            exptime,
        };
        match self.execute(&request)? {
            Reply::Numeric(value) => Ok(value),
            other => Err(unexpected("incr_with_initial", &other)),
        }
    }
}
