//! Cache client: operation dispatch and the counter engine
//!
//! Every operation follows the same path: validate locally, build the
//! physical key, check out a pooled store handle, run one store
//! primitive, return the handle. Local refusals never touch the pool.

use crate::config::Config;
use crate::key::KeyBuilder;
use crate::metrics::Metrics;
use crate::pool::ConnectionPool;
use crate::protocol::StoreMode;
use crate::result::{OpResult, ResultCode};
use crate::store::{ClusterHandle, Store};
use crate::ttl::Ttl;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest value the host can hold in one variable
pub const MAX_VALUE_LENGTH: usize = 4096;

/// Pooled client over the store cluster
pub struct CacheClient<S: Store = ClusterHandle> {
    pool: ConnectionPool<S>,
    keys: KeyBuilder,
    default_ttl: u32,
    binary_protocol: bool,
    acquire_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl CacheClient<ClusterHandle> {
    /// Build `pool.size` cluster handles; connections open lazily on first use
    pub fn connect(config: &Config) -> Self {
        let handles = (0..config.pool.size)
            .map(|_| ClusterHandle::new(config))
            .collect();

        info!(
            servers = config.general.servers().len(),
            pool_size = config.pool.size,
            binary_proto = config.general.binary_proto,
            hash = ?config.general.hash,
            "memcached client initialized"
        );
        Self::with_handles(config, handles)
    }
}

impl<S: Store> CacheClient<S> {
    /// Pool the given handles under `config`'s key, TTL and protocol settings
    pub fn with_handles(config: &Config, handles: Vec<S>) -> Self {
        Self {
            pool: ConnectionPool::new(handles),
            keys: KeyBuilder::new(config.general.keyprefix.clone()),
            default_ttl: config.general.ttl,
            binary_protocol: config.general.binary_proto,
            acquire_timeout: config.pool.acquire_timeout(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn pool(&self) -> &ConnectionPool<S> {
        &self.pool
    }

    pub fn binary_protocol(&self) -> bool {
        self.binary_protocol
    }

    /// Fetch a value. Values too large for the host fail with
    /// `ValueTooLong` and are not returned.
    pub fn get(&self, key: &str) -> OpResult<Vec<u8>> {
        self.metrics.cmd_get.inc();
        let physical = self.physical_key("get", key)?;

        match self.with_handle("get", |store| store.get(&physical)) {
            Ok(value) if value.len() > MAX_VALUE_LENGTH => {
                self.metrics.get_hits.inc();
                warn!(
                    key,
                    len = value.len(),
                    max = MAX_VALUE_LENGTH,
                    "value does not fit in the host buffer"
                );
                self.reject("get", key, ResultCode::ValueTooLong)
            }
            Ok(value) => {
                self.metrics.get_hits.inc();
                Ok(value)
            }
            Err(code) => {
                if code == ResultCode::NotFound {
                    self.metrics.get_misses.inc();
                }
                Err(code)
            }
        }
    }

    pub fn set(&self, key: &str, value: &[u8], ttl: Ttl<'_>) -> OpResult<()> {
        self.store(StoreMode::Set, key, value, ttl)
    }

    /// Store only if the key is absent
    pub fn add(&self, key: &str, value: &[u8], ttl: Ttl<'_>) -> OpResult<()> {
        self.store(StoreMode::Add, key, value, ttl)
    }

    /// Store only if the key is present
    pub fn replace(&self, key: &str, value: &[u8], ttl: Ttl<'_>) -> OpResult<()> {
        self.store(StoreMode::Replace, key, value, ttl)
    }

    /// Atomically append to an existing value
    pub fn append(&self, key: &str, value: &[u8], ttl: Ttl<'_>) -> OpResult<()> {
        self.store(StoreMode::Append, key, value, ttl)
    }

    /// Shared write path for set/add/replace/append
    pub fn store(&self, mode: StoreMode, key: &str, value: &[u8], ttl: Ttl<'_>) -> OpResult<()> {
        let op = mode.name();
        match mode {
            StoreMode::Set => self.metrics.cmd_set.inc(),
            StoreMode::Add => self.metrics.cmd_add.inc(),
            StoreMode::Replace => self.metrics.cmd_replace.inc(),
            StoreMode::Append => self.metrics.cmd_append.inc(),
        }

        let physical = self.physical_key(op, key)?;
        if value.len() > MAX_VALUE_LENGTH {
            return self.reject(op, key, ResultCode::ValueTooLong);
        }
        if value.is_empty() {
            warn!(op, key, "storing an empty value");
        }

        let exptime = ttl.resolve(self.default_ttl);
        debug!(op, key, exptime, len = value.len(), "store");
        self.with_handle(op, |store| store.store(mode, &physical, value, exptime))
    }

    pub fn delete(&self, key: &str) -> OpResult<()> {
        self.metrics.cmd_delete.inc();
        let physical = self.physical_key("delete", key)?;
        self.with_handle("delete", |store| store.delete(&physical))
    }

    /// Create the counter holding `initial`, or increment an existing one by 0.
    ///
    /// Mirrors the store's increment-with-initial: only the first call
    /// sets the value, later calls leave it where it is.
    pub fn counter_initialize(&self, key: &str, initial: u64, ttl: Ttl<'_>) -> OpResult<u64> {
        self.metrics.cmd_counter_init.inc();
        self.require_binary("counter_initialize", key)?;
        let physical = self.physical_key("counter_initialize", key)?;

        let exptime = ttl.resolve(self.default_ttl);
        debug!(key, initial, exptime, "counter initialize");
        self.with_handle("counter_initialize", |store| {
            store.increment_with_initial(&physical, 0, initial, exptime)
        })
    }

    /// Increment (delta > 0), decrement (delta < 0) or read (delta == 0)
    /// a counter, returning its value afterwards
    pub fn counter_read_or_adjust(&self, key: &str, delta: i64) -> OpResult<u64> {
        let op = if delta < 0 { "decr" } else { "incr" };
        if delta < 0 {
            self.metrics.cmd_decr.inc();
        } else {
            self.metrics.cmd_incr.inc();
        }
        self.require_binary(op, key)?;
        let physical = self.physical_key(op, key)?;

        debug!(key, delta, "counter adjust");
        self.with_handle(op, |store| {
            if delta < 0 {
                store.decrement(&physical, delta.unsigned_abs())
            } else {
                store.increment(&physical, delta.unsigned_abs())
            }
        })
    }

    fn require_binary(&self, op: &'static str, key: &str) -> OpResult<()> {
        if self.binary_protocol {
            Ok(())
        } else {
            self.reject(op, key, ResultCode::BinaryProtocolRequired)
        }
    }

    fn physical_key(&self, op: &'static str, key: &str) -> OpResult<Vec<u8>> {
        if key.is_empty() {
            return self.reject(op, key, ResultCode::ArgumentNeeded);
        }
        self.keys.build(key).or_else(|code| self.reject(op, key, code))
    }

    fn reject<T>(&self, op: &'static str, key: &str, code: ResultCode) -> OpResult<T> {
        self.metrics.local_rejections.inc();
        warn!(op, key, code = code.code(), "refused: {}", code.description());
        Err(code)
    }

    /// Run `f` on a checked-out handle; the handle goes back whatever `f` returns
    fn with_handle<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut S) -> OpResult<T>,
    ) -> OpResult<T> {
        let _timer = self.metrics.cmd_latency.start_timer();

        let mut handle = match self.pool.acquire(self.acquire_timeout) {
            Ok(handle) => handle,
            Err(e) => {
                self.metrics.pool_timeouts.inc();
                self.metrics.local_rejections.inc();
                warn!(op, "memcached pool error: {e}");
                return Err(ResultCode::PoolAcquireTimeout);
            }
        };

        self.metrics.handles_in_use.inc();
        let result = f(&mut *handle);
        drop(handle);
        self.metrics.handles_in_use.dec();

        if let Err(code) = result {
            self.metrics.store_errors.inc();
            warn!(op, code = code.code(), "memcached error: {}", code.description());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MAX_KEY_LENGTH;
    use crate::store::memory::MemoryStore;
    use std::thread;

    fn config() -> Config {
        let mut config = Config::default();
        config.general.keyprefix = "pbx:".to_string();
        config
    }

    fn client_with(config: &Config, handles: usize) -> (CacheClient<MemoryStore>, MemoryStore) {
        let store = MemoryStore::new();
        let client = CacheClient::with_handles(config, vec![store.clone(); handles]);
        (client, store)
    }

    fn client() -> (CacheClient<MemoryStore>, MemoryStore) {
        client_with(&config(), 2)
    }

    #[test]
    fn test_set_then_get() {
        let (client, store) = client();
        client.set("greeting", b"hello", Ttl::default()).unwrap();
        assert_eq!(client.get("greeting").unwrap(), b"hello");
        assert_eq!(store.value(b"pbx:greeting").unwrap(), b"hello");

        client.set("empty", b"", Ttl::default()).unwrap();
        assert_eq!(client.get("empty").unwrap(), b"");
    }

    #[test]
    fn test_add_keeps_first_value() {
        let (client, _) = client();
        client.add("k", b"v1", Ttl::default()).unwrap();
        assert_eq!(
            client.add("k", b"v2", Ttl::default()),
            Err(ResultCode::DataExists)
        );
        assert_eq!(client.get("k").unwrap(), b"v1");
    }

    #[test]
    fn test_replace_absent_key() {
        let (client, store) = client();
        assert_eq!(
            client.replace("k", b"v", Ttl::default()),
            Err(ResultCode::NotFound)
        );
        assert!(store.value(b"pbx:k").is_none());

        client.set("k", b"old", Ttl::default()).unwrap();
        client.replace("k", b"new", Ttl::default()).unwrap();
        assert_eq!(client.get("k").unwrap(), b"new");
    }

    #[test]
    fn test_append_uses_one_store_call() {
        let (client, store) = client();
        client.set("k", b"hello", Ttl::default()).unwrap();
        let before = store.calls();
        client.append("k", b" world", Ttl::default()).unwrap();
        assert_eq!(store.calls(), before + 1);
        assert_eq!(client.get("k").unwrap(), b"hello world");

        assert_eq!(
            client.append("missing", b"x", Ttl::default()),
            Err(ResultCode::NotStored)
        );
    }

    #[test]
    fn test_concurrent_appends_keep_every_fragment() {
        let mut config = config();
        config.pool.acquire_timeout_us = 5_000_000;
        let (client, store) = client_with(&config, 2);
        client.set("log", b"", Ttl::default()).unwrap();

        thread::scope(|s| {
            for fragment in [b"a", b"b"] {
                let client = &client;
                s.spawn(move || {
                    for _ in 0..100 {
                        client.append("log", fragment, Ttl::default()).unwrap();
                    }
                });
            }
        });

        let value = store.value(b"pbx:log").unwrap();
        assert_eq!(value.len(), 200);
        assert_eq!(value.iter().filter(|&&b| b == b'a').count(), 100);
        assert_eq!(value.iter().filter(|&&b| b == b'b').count(), 100);
        assert_eq!(client.pool().idle(), 2);
    }

    #[test]
    fn test_delete_then_get() {
        let (client, _) = client();
        client.set("k", b"v", Ttl::default()).unwrap();
        client.delete("k").unwrap();
        assert_eq!(client.get("k"), Err(ResultCode::NotFound));
        assert_eq!(client.delete("k"), Err(ResultCode::NotFound));
        assert_eq!(client.metrics().get_misses.get(), 1);
    }

    #[test]
    fn test_key_too_long_never_reaches_store() {
        let (client, store) = client();
        let key = "k".repeat(MAX_KEY_LENGTH);

        assert_eq!(client.get(&key), Err(ResultCode::KeyTooLong));
        assert_eq!(client.set(&key, b"v", Ttl::default()), Err(ResultCode::KeyTooLong));
        assert_eq!(client.append(&key, b"v", Ttl::default()), Err(ResultCode::KeyTooLong));
        assert_eq!(client.delete(&key), Err(ResultCode::KeyTooLong));
        assert_eq!(
            client.counter_initialize(&key, 1, Ttl::default()),
            Err(ResultCode::KeyTooLong)
        );
        assert_eq!(client.counter_read_or_adjust(&key, 0), Err(ResultCode::KeyTooLong));
        assert_eq!(store.calls(), 0);
    }

    #[test]
    fn test_empty_key_needs_argument() {
        let (client, store) = client();
        assert_eq!(client.get(""), Err(ResultCode::ArgumentNeeded));
        assert_eq!(client.delete(""), Err(ResultCode::ArgumentNeeded));
        assert_eq!(store.calls(), 0);
    }

    #[test]
    fn test_oversized_values_fail_closed() {
        let (client, store) = client();
        let big = vec![b'x'; MAX_VALUE_LENGTH + 1];

        assert_eq!(
            client.set("big", &big, Ttl::default()),
            Err(ResultCode::ValueTooLong)
        );
        assert_eq!(store.calls(), 0);

        store.insert(b"pbx:big", &big);
        assert_eq!(client.get("big"), Err(ResultCode::ValueTooLong));

        store.insert(b"pbx:fits", &big[..MAX_VALUE_LENGTH]);
        assert_eq!(client.get("fits").unwrap().len(), MAX_VALUE_LENGTH);
    }

    #[test]
    fn test_ttl_precedence_on_writes() {
        let mut config = config();
        config.general.ttl = 30;
        let (client, store) = client_with(&config, 1);

        client.set("k", b"v", Ttl::default()).unwrap();
        assert_eq!(store.last_exptime(), Some(30));

        client.set("k", b"v", Ttl::scoped("10")).unwrap();
        assert_eq!(store.last_exptime(), Some(10));

        client.set("k", b"v", Ttl::scoped("later")).unwrap();
        assert_eq!(store.last_exptime(), Some(30));

        let both = Ttl {
            explicit: Some(5),
            scoped: Some("10"),
        };
        client.add("other", b"v", both).unwrap();
        assert_eq!(store.last_exptime(), Some(5));
    }

    #[test]
    fn test_counter_initialize_then_adjust() {
        let (client, _) = client();
        assert_eq!(client.counter_initialize("calls", 678, Ttl::default()), Ok(678));
        assert_eq!(client.counter_read_or_adjust("calls", -12), Ok(666));
        assert_eq!(client.counter_read_or_adjust("calls", 0), Ok(666));
        assert_eq!(client.counter_read_or_adjust("calls", 4), Ok(670));
    }

    #[test]
    fn test_counter_initialize_keeps_existing_value() {
        let (client, _) = client();
        client.counter_initialize("c", 10, Ttl::default()).unwrap();
        client.counter_read_or_adjust("c", 5).unwrap();
        assert_eq!(client.counter_initialize("c", 99, Ttl::default()), Ok(15));
    }

    #[test]
    fn test_counter_ttl() {
        let (client, store) = client();
        client.counter_initialize("c", 1, Ttl::default()).unwrap();
        assert_eq!(store.last_exptime(), Some(0));
        client.counter_initialize("d", 1, Ttl::scoped("60")).unwrap();
        assert_eq!(store.last_exptime(), Some(60));
    }

    #[test]
    fn test_counter_absent_or_non_numeric() {
        let (client, _) = client();
        assert_eq!(client.counter_read_or_adjust("nope", 1), Err(ResultCode::NotFound));
        client.set("text", b"abc", Ttl::default()).unwrap();
        assert_eq!(
            client.counter_read_or_adjust("text", 1),
            Err(ResultCode::InvalidArguments)
        );
    }

    #[test]
    fn test_counters_require_binary_protocol() {
        let mut config = config();
        config.general.binary_proto = false;
        let (client, store) = client_with(&config, 1);

        assert_eq!(
            client.counter_initialize("c", 1, Ttl::default()),
            Err(ResultCode::BinaryProtocolRequired)
        );
        assert_eq!(
            client.counter_read_or_adjust("c", 0),
            Err(ResultCode::BinaryProtocolRequired)
        );
        // refused before the key is even looked at
        assert_eq!(
            client.counter_read_or_adjust("", 1),
            Err(ResultCode::BinaryProtocolRequired)
        );
        assert_eq!(store.calls(), 0);

        client.set("plain", b"ok", Ttl::default()).unwrap();
    }

    #[test]
    fn test_pool_exhaustion_times_out() {
        let (client, store) = client_with(&config(), 1);
        let held = client.pool().acquire(Duration::from_millis(1)).unwrap();

        assert_eq!(client.get("k"), Err(ResultCode::PoolAcquireTimeout));
        assert_eq!(
            client.set("k", b"v", Ttl::default()),
            Err(ResultCode::PoolAcquireTimeout)
        );
        assert_eq!(store.calls(), 0);
        assert_eq!(client.metrics().pool_timeouts.get(), 2);

        drop(held);
        client.set("k", b"v", Ttl::default()).unwrap();
    }

    #[test]
    fn test_handles_returned_after_failures() {
        let (client, _) = client_with(&config(), 1);
        for _ in 0..3 {
            assert_eq!(client.get("missing"), Err(ResultCode::NotFound));
        }
        assert_eq!(client.pool().idle(), 1);
        assert_eq!(client.metrics().handles_in_use.get(), 0);
    }
}
