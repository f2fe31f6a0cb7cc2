//! Store access: the `Store` seam and its memcached implementation

mod cluster;
mod connection;
#[cfg(test)]
pub(crate) mod memory;

pub use cluster::ClusterHandle;
pub use connection::Connection;

use crate::protocol::StoreMode;
use crate::result::OpResult;

/// One pooled session against the store cluster.
///
/// Failures carry the store-band result code; a missing key is
/// `ResultCode::NotFound`.
pub trait Store: Send {
    /// Fetch the value stored under `key`
    fn get(&mut self, key: &[u8]) -> OpResult<Vec<u8>>;

    /// set/add/replace/append, using the store's native primitive.
    ///
    /// Append to a missing key reports the store's not-stored code
    /// (`ResultCode::NotStored`), not `ResultCode::NotFound`.
    fn store(&mut self, mode: StoreMode, key: &[u8], value: &[u8], exptime: u32) -> OpResult<()>;

    fn delete(&mut self, key: &[u8]) -> OpResult<()>;

    /// Atomic increment of an existing counter
    fn increment(&mut self, key: &[u8], delta: u64) -> OpResult<u64>;

    /// Atomic decrement of an existing counter, saturating at zero
    fn decrement(&mut self, key: &[u8], delta: u64) -> OpResult<u64>;

    /// Atomic increment that creates the counter with `initial` when absent
    fn increment_with_initial(
        &mut self,
        key: &[u8],
        delta: u64,
        initial: u64,
        exptime: u32,
    ) -> OpResult<u64>;
}
