//! Entry points for the call-processing host
//!
//! The host hands over raw argument strings and a channel holding named
//! variables. Every entry point leaves its numeric result in `MCDRESULT`,
//! including when it refuses its arguments.

use crate::client::CacheClient;
use crate::protocol::StoreMode;
use crate::result::{OpResult, ResultCode};
use crate::store::{ClusterHandle, Store};
use crate::ttl::Ttl;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Variable receiving the result code of the last operation
pub const RESULT_VAR: &str = "MCDRESULT";

/// Caller-scoped TTL override, in seconds
pub const TTL_VAR: &str = "MCDTTL";

/// Variable storage of one call
pub trait Channel {
    fn var(&self, name: &str) -> Option<String>;
    fn set_var(&mut self, name: &str, value: &str);
}

/// Plain map-backed channel
#[derive(Debug, Clone, Default)]
pub struct Variables(HashMap<String, String>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric value of `MCDRESULT`, if set
    pub fn result(&self) -> Option<i32> {
        self.0.get(RESULT_VAR)?.parse().ok()
    }
}

impl Channel for Variables {
    fn var(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }

    fn set_var(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }
}

/// Host functions and applications bound to one client
pub struct Functions<'a, S: Store = ClusterHandle> {
    client: &'a CacheClient<S>,
}

impl<'a, S: Store> Functions<'a, S> {
    pub fn new(client: &'a CacheClient<S>) -> Self {
        Self { client }
    }

    /// `MCD(key)` read. Empty on any failure.
    pub fn mcd_read(&self, chan: &mut impl Channel, key: &str) -> String {
        let key = key.trim();
        let result = if key.is_empty() {
            needed("MCD", "key")
        } else {
            self.client.get(key)
        };
        finish(chan, &result);
        result.map(into_string).unwrap_or_default()
    }

    /// `MCD(key)=value`
    pub fn mcd_write(&self, chan: &mut impl Channel, key: &str, value: &str) {
        let key = key.trim();
        if key.is_empty() {
            return finish(chan, &needed::<()>("MCD", "key"));
        }
        let result = self.write(&*chan, StoreMode::Set, key, value);
        finish(chan, &result);
    }

    /// `mcdget(varname,key)`: clears `varname`, then fills it on a hit
    pub fn mcdget(&self, chan: &mut impl Channel, args: &str) {
        let (varname, key) = split_args(args);
        let varname = varname.trim();
        let key = key.unwrap_or_default().trim();

        if key.is_empty() {
            return finish(chan, &needed::<()>("mcdget", "key"));
        }
        if varname.is_empty() {
            return finish(chan, &needed::<()>("mcdget", "variable name"));
        }

        chan.set_var(varname, "");
        let result = self.client.get(key);
        if let Ok(value) = &result {
            chan.set_var(varname, &String::from_utf8_lossy(value));
        }
        finish(chan, &result);
    }

    /// `mcdset(key,value)`
    pub fn mcdset(&self, chan: &mut impl Channel, args: &str) {
        self.put(chan, StoreMode::Set, args);
    }

    /// `mcdadd(key,value)`
    pub fn mcdadd(&self, chan: &mut impl Channel, args: &str) {
        self.put(chan, StoreMode::Add, args);
    }

    /// `mcdreplace(key,value)`
    pub fn mcdreplace(&self, chan: &mut impl Channel, args: &str) {
        self.put(chan, StoreMode::Replace, args);
    }

    /// `mcdappend(key,value)`
    pub fn mcdappend(&self, chan: &mut impl Channel, args: &str) {
        self.put(chan, StoreMode::Append, args);
    }

    /// `mcddelete(key)`
    pub fn mcddelete(&self, chan: &mut impl Channel, args: &str) {
        let (key, _) = split_args(args);
        let key = key.trim();
        let result = if key.is_empty() {
            needed("mcddelete", "key")
        } else {
            self.client.delete(key)
        };
        finish(chan, &result);
    }

    /// `MCDCOUNTER(key[,increment])` read: adjusts by the increment (0 reads)
    /// and returns the resulting value, or empty on failure
    pub fn counter_read(&self, chan: &mut impl Channel, args: &str) -> String {
        let (key, increment) = split_args(args);
        let key = key.trim();
        let increment = increment.map(str::trim).unwrap_or_default();

        let delta = if increment.is_empty() {
            Ok(0)
        } else {
            increment.parse::<i64>().map_err(|_| {
                warn!("MCDCOUNTER() increment {increment:?} is not an integer");
                ResultCode::BadIncrement
            })
        };

        let result = match delta {
            // the capability check outranks a malformed increment
            Err(code) if self.client.binary_protocol() => Err(code),
            Err(_) => self.client.counter_read_or_adjust(key, 0),
            Ok(delta) => self.client.counter_read_or_adjust(key, delta),
        };
        finish(chan, &result);
        result.map(|n| n.to_string()).unwrap_or_default()
    }

    /// `MCDCOUNTER(key)=initial`
    pub fn counter_write(&self, chan: &mut impl Channel, key: &str, value: &str) {
        let key = key.trim();
        let initial = value.trim().parse::<u64>().unwrap_or_else(|_| {
            warn!("initializing value {value:?} not numeric, will force to 0");
            0
        });

        let ttl_var = chan.var(TTL_VAR);
        let ttl = ttl_var.as_deref().map(Ttl::scoped).unwrap_or_default();
        debug!(key, initial, "MCDCOUNTER() write");
        let result = self.client.counter_initialize(key, initial, ttl);
        finish(chan, &result);
    }

    fn put(&self, chan: &mut impl Channel, mode: StoreMode, args: &str) {
        let (key, value) = split_args(args);
        let key = key.trim();
        if key.is_empty() {
            return finish(chan, &needed::<()>(mode.name(), "key"));
        }
        let result = self.write(&*chan, mode, key, value.unwrap_or_default());
        finish(chan, &result);
    }

    fn write(&self, chan: &impl Channel, mode: StoreMode, key: &str, value: &str) -> OpResult<()> {
        let ttl_var = chan.var(TTL_VAR);
        let ttl = ttl_var.as_deref().map(Ttl::scoped).unwrap_or_default();
        self.client.store(mode, key, value.as_bytes(), ttl)
    }
}

/// Split `first,rest` at the first comma; the rest may itself contain commas
fn split_args(args: &str) -> (&str, Option<&str>) {
    match args.split_once(',') {
        Some((first, rest)) => (first, Some(rest)),
        None => (args, None),
    }
}

fn needed<T>(function: &str, what: &str) -> OpResult<T> {
    warn!("{function}() requires argument ({what})");
    Err(ResultCode::ArgumentNeeded)
}

fn finish<T>(chan: &mut impl Channel, result: &OpResult<T>) {
    let code = ResultCode::of(result);
    chan.set_var(RESULT_VAR, itoa::Buffer::new().format(code.code()));
}

fn into_string(value: Vec<u8>) -> String {
    String::from_utf8_lossy(&value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MAX_VALUE_LENGTH;
    use crate::config::Config;
    use crate::store::memory::MemoryStore;

    fn client(binary: bool) -> (CacheClient<MemoryStore>, MemoryStore) {
        let mut config = Config::default();
        config.general.binary_proto = binary;
        config.general.ttl = 300;
        let store = MemoryStore::new();
        (CacheClient::with_handles(&config, vec![store.clone()]), store)
    }

    fn code(chan: &Variables) -> ResultCode {
        chan.result().and_then(ResultCode::from_code).unwrap()
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("k,v"), ("k", Some("v")));
        assert_eq!(split_args("k,a,b"), ("k", Some("a,b")));
        assert_eq!(split_args("k"), ("k", None));
        assert_eq!(split_args(""), ("", None));
    }

    #[test]
    fn test_mcd_write_then_read() {
        let (client, _) = client(true);
        let funcs = Functions::new(&client);
        let mut chan = Variables::new();

        funcs.mcd_write(&mut chan, "caller", "5551234");
        assert_eq!(code(&chan), ResultCode::Success);
        assert_eq!(funcs.mcd_read(&mut chan, "caller"), "5551234");
        assert_eq!(code(&chan), ResultCode::Success);

        assert_eq!(funcs.mcd_read(&mut chan, "absent"), "");
        assert_eq!(code(&chan), ResultCode::NotFound);
    }

    #[test]
    fn test_missing_arguments_set_result() {
        let (client, store) = client(true);
        let funcs = Functions::new(&client);
        let mut chan = Variables::new();

        funcs.mcdset(&mut chan, "");
        assert_eq!(code(&chan), ResultCode::ArgumentNeeded);
        funcs.mcdget(&mut chan, "target");
        assert_eq!(code(&chan), ResultCode::ArgumentNeeded);
        funcs.mcdget(&mut chan, ",key");
        assert_eq!(code(&chan), ResultCode::ArgumentNeeded);
        funcs.mcddelete(&mut chan, " ");
        assert_eq!(code(&chan), ResultCode::ArgumentNeeded);
        assert_eq!(funcs.mcd_read(&mut chan, ""), "");
        assert_eq!(code(&chan), ResultCode::ArgumentNeeded);
        assert_eq!(store.calls(), 0);
    }

    #[test]
    fn test_mcdget_clears_target_on_miss() {
        let (client, _) = client(true);
        let funcs = Functions::new(&client);
        let mut chan = Variables::new();
        chan.set_var("target", "stale");

        funcs.mcdget(&mut chan, "target,absent");
        assert_eq!(chan.var("target").as_deref(), Some(""));
        assert_eq!(code(&chan), ResultCode::NotFound);

        funcs.mcdset(&mut chan, "present,a,b");
        funcs.mcdget(&mut chan, "target,present");
        assert_eq!(chan.var("target").as_deref(), Some("a,b"));
        assert_eq!(code(&chan), ResultCode::Success);
    }

    #[test]
    fn test_oversized_value_leaves_output_empty() {
        let (client, store) = client(true);
        let funcs = Functions::new(&client);
        let mut chan = Variables::new();
        store.insert(b"big", &vec![b'x'; MAX_VALUE_LENGTH + 1]);
        chan.set_var("target", "stale");

        funcs.mcdget(&mut chan, "target,big");
        assert_eq!(chan.var("target").as_deref(), Some(""));
        assert_eq!(code(&chan), ResultCode::ValueTooLong);
        assert_eq!(chan.result(), Some(125));

        assert_eq!(funcs.mcd_read(&mut chan, "big"), "");
        assert_eq!(code(&chan), ResultCode::ValueTooLong);
    }

    #[test]
    fn test_write_variants_report_store_codes() {
        let (client, _) = client(true);
        let funcs = Functions::new(&client);
        let mut chan = Variables::new();

        funcs.mcdadd(&mut chan, "k,one");
        assert_eq!(code(&chan), ResultCode::Success);
        funcs.mcdadd(&mut chan, "k,two");
        assert_eq!(code(&chan), ResultCode::DataExists);
        funcs.mcdreplace(&mut chan, "other,x");
        assert_eq!(code(&chan), ResultCode::NotFound);
        funcs.mcdappend(&mut chan, "k, more");
        assert_eq!(code(&chan), ResultCode::Success);
        assert_eq!(funcs.mcd_read(&mut chan, "k"), "one more");
        funcs.mcdappend(&mut chan, "other,x");
        assert_eq!(code(&chan), ResultCode::NotStored);

        funcs.mcddelete(&mut chan, "k");
        assert_eq!(code(&chan), ResultCode::Success);
        funcs.mcddelete(&mut chan, "k");
        assert_eq!(code(&chan), ResultCode::NotFound);
    }

    #[test]
    fn test_ttl_variable_override() {
        let (client, store) = client(true);
        let funcs = Functions::new(&client);
        let mut chan = Variables::new();

        funcs.mcdset(&mut chan, "k,v");
        assert_eq!(store.last_exptime(), Some(300));

        chan.set_var(TTL_VAR, "1");
        funcs.mcdset(&mut chan, "k,v");
        assert_eq!(store.last_exptime(), Some(1));

        chan.set_var(TTL_VAR, "soon");
        funcs.mcd_write(&mut chan, "k", "v");
        assert_eq!(store.last_exptime(), Some(300));
        assert_eq!(code(&chan), ResultCode::Success);
    }

    #[test]
    fn test_counter_functions() {
        let (client, _) = client(true);
        let funcs = Functions::new(&client);
        let mut chan = Variables::new();

        funcs.counter_write(&mut chan, "calls", "678");
        assert_eq!(code(&chan), ResultCode::Success);
        assert_eq!(funcs.counter_read(&mut chan, "calls,-12"), "666");
        assert_eq!(funcs.counter_read(&mut chan, "calls"), "666");
        assert_eq!(funcs.counter_read(&mut chan, "calls,+4"), "670");

        assert_eq!(funcs.counter_read(&mut chan, "calls,lots"), "");
        assert_eq!(code(&chan), ResultCode::BadIncrement);

        funcs.counter_write(&mut chan, "fresh", "many");
        assert_eq!(funcs.counter_read(&mut chan, "fresh"), "0");

        assert_eq!(funcs.counter_read(&mut chan, "absent,1"), "");
        assert_eq!(code(&chan), ResultCode::NotFound);
    }

    #[test]
    fn test_counters_need_binary_protocol() {
        let (client, store) = client(false);
        let funcs = Functions::new(&client);
        let mut chan = Variables::new();

        funcs.counter_write(&mut chan, "c", "1");
        assert_eq!(code(&chan), ResultCode::BinaryProtocolRequired);
        assert_eq!(funcs.counter_read(&mut chan, "c,oops"), "");
        assert_eq!(code(&chan), ResultCode::BinaryProtocolRequired);
        assert_eq!(store.calls(), 0);
    }
}
