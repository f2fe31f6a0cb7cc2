//! In-memory `Store` used by unit tests

use super::Store;
use crate::protocol::StoreMode;
use crate::result::{OpResult, ResultCode};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct Shared {
    entries: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    last_exptime: Mutex<Option<u32>>,
    calls: AtomicUsize,
}

/// Cloneable handle onto one shared map, answering like a binary-protocol server
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store calls made through any clone
    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    pub fn value(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.shared.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: &[u8], value: &[u8]) {
        self.shared.entries.lock().insert(key.to_vec(), value.to_vec());
    }

    pub fn last_exptime(&self) -> Option<u32> {
        *self.shared.last_exptime.lock()
    }

    fn called(&self) {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn adjust(&self, key: &[u8], f: impl FnOnce(u64) -> u64) -> OpResult<u64> {
        let mut entries = self.shared.entries.lock();
        let entry = entries.get_mut(key).ok_or(ResultCode::NotFound)?;
        let current: u64 = std::str::from_utf8(entry)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(ResultCode::InvalidArguments)?;
        let next = f(current);
        *entry = next.to_string().into_bytes();
        Ok(next)
    }
}

impl Store for MemoryStore {
    fn get(&mut self, key: &[u8]) -> OpResult<Vec<u8>> {
        self.called();
        self.value(key).ok_or(ResultCode::NotFound)
    }

    fn store(&mut self, mode: StoreMode, key: &[u8], value: &[u8], exptime: u32) -> OpResult<()> {
        self.called();
        *self.shared.last_exptime.lock() = Some(exptime);
        let mut entries = self.shared.entries.lock();
        match (mode, entries.get_mut(key)) {
            (StoreMode::Add, Some(_)) => Err(ResultCode::DataExists),
            (StoreMode::Replace, None) => Err(ResultCode::NotFound),
            (StoreMode::Append, None) => Err(ResultCode::NotStored),
            (StoreMode::Append, Some(existing)) => {
                existing.extend_from_slice(value);
                Ok(())
            }
            _ => {
                entries.insert(key.to_vec(), value.to_vec());
                Ok(())
            }
        }
    }

    fn delete(&mut self, key: &[u8]) -> OpResult<()> {
        self.called();
        self.shared
            .entries
            .lock()
            .remove(key)
            .map(|_| ())
            .ok_or(ResultCode::NotFound)
    }

    fn increment(&mut self, key: &[u8], delta: u64) -> OpResult<u64> {
        self.called();
        self.adjust(key, |n| n.wrapping_add(delta))
    }

    fn decrement(&mut self, key: &[u8], delta: u64) -> OpResult<u64> {
        self.called();
        self.adjust(key, |n| n.saturating_sub(delta))
    }

    fn increment_with_initial(
        &mut self,
        key: &[u8],
        delta: u64,
        initial: u64,
        exptime: u32,
    ) -> OpResult<u64> {
        self.called();
        *self.shared.last_exptime.lock() = Some(exptime);
        let mut entries = self.shared.entries.lock();
        if !entries.contains_key(key) {
            entries.insert(key.to_vec(), initial.to_string().into_bytes());
            return Ok(initial);
        }
        drop(entries);
        self.adjust(key, |n| n.wrapping_add(delta))
    }
}
