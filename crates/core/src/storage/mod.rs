//! Durable key-value storage contract consumed by the offline sync queue.

mod memory_store;

pub use memory_store::MemoryStore;

use crate::Result;

/// String key-value store with finite capacity.
///
/// Writes are synchronous: once `set` returns `Ok`, the value must survive a
/// process restart for durable backends. Backends report capacity overflow as
/// [`crate::StorageError::QuotaExceeded`] so callers can prune and retry.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}
