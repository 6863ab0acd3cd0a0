//! Scheduler and queue-limit defaults for offline sync.

/// Periodic flush cadence in seconds.
pub const OFFLINE_SYNC_INTERVAL_SECS: u64 = 30;

/// Maximum jitter (milliseconds) added to periodic flush intervals.
pub const OFFLINE_SYNC_INTERVAL_JITTER_MS: u64 = 2_000;

/// Items dispatched concurrently per batch.
pub const OFFLINE_SYNC_BATCH_SIZE: usize = 5;

/// Failed attempts after which an unsynced item is garbage-collected.
pub const OFFLINE_SYNC_MAX_RETRIES: u32 = 3;

/// Upper bound on the serialized queue written to durable storage.
pub const OFFLINE_SYNC_STORAGE_BUDGET_BYTES: usize = 5 * 1024 * 1024;

/// How long synced items are kept for diagnostics before cleanup.
pub const OFFLINE_SYNC_SYNCED_RETENTION_SECS: u64 = 60 * 60 * 24;

/// Items older than this are dropped by forced (storage-pressure) cleanup.
pub const OFFLINE_SYNC_MAX_ITEM_AGE_SECS: u64 = 60 * 60 * 24 * 7;
