//! Tunables for the offline sync queue.

use std::time::Duration;

use greenmate_core::sync::{
    OFFLINE_SYNC_BATCH_SIZE, OFFLINE_SYNC_INTERVAL_JITTER_MS, OFFLINE_SYNC_INTERVAL_SECS,
    OFFLINE_SYNC_MAX_ITEM_AGE_SECS, OFFLINE_SYNC_MAX_RETRIES, OFFLINE_SYNC_STORAGE_BUDGET_BYTES,
    OFFLINE_SYNC_SYNCED_RETENTION_SECS,
};

use crate::client::DEFAULT_TIMEOUT_SECS;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

pub const API_URL_ENV: &str = "GREENMATE_API_URL";
pub const BATCH_SIZE_ENV: &str = "GREENMATE_SYNC_BATCH_SIZE";
pub const MAX_RETRIES_ENV: &str = "GREENMATE_SYNC_MAX_RETRIES";
pub const INTERVAL_SECS_ENV: &str = "GREENMATE_SYNC_INTERVAL_SECS";
pub const STORAGE_BUDGET_ENV: &str = "GREENMATE_STORAGE_BUDGET_BYTES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_base_url: String,
    /// Items dispatched concurrently per batch. Never zero.
    pub batch_size: usize,
    /// Failed attempts after which an unsynced item is dropped.
    pub max_retries: u32,
    pub sync_interval: Duration,
    /// Upper bound of the random delay added to each periodic tick.
    pub sync_jitter: Duration,
    /// Upper bound on the serialized queue size.
    pub storage_budget_bytes: usize,
    pub synced_retention: Duration,
    pub max_item_age: Duration,
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            batch_size: OFFLINE_SYNC_BATCH_SIZE,
            max_retries: OFFLINE_SYNC_MAX_RETRIES,
            sync_interval: Duration::from_secs(OFFLINE_SYNC_INTERVAL_SECS),
            sync_jitter: Duration::from_millis(OFFLINE_SYNC_INTERVAL_JITTER_MS),
            storage_budget_bytes: OFFLINE_SYNC_STORAGE_BUDGET_BYTES,
            synced_retention: Duration::from_secs(OFFLINE_SYNC_SYNCED_RETENTION_SECS),
            max_item_age: Duration::from_secs(OFFLINE_SYNC_MAX_ITEM_AGE_SECS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `GREENMATE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset, blank or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let parse = |key: &str| -> Option<u64> {
            let raw = read(key)?;
            match raw.parse::<u64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("[OfflineSync] Ignoring invalid {}={:?}", key, raw);
                    None
                }
            }
        };

        let mut config = Self::default();
        if let Some(url) = read(API_URL_ENV) {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(size) = parse(BATCH_SIZE_ENV).filter(|v| *v > 0) {
            config.batch_size = size as usize;
        }
        if let Some(retries) = parse(MAX_RETRIES_ENV).filter(|v| *v > 0) {
            config.max_retries = u32::try_from(retries).unwrap_or(u32::MAX);
        }
        if let Some(secs) = parse(INTERVAL_SECS_ENV).filter(|v| *v > 0) {
            config.sync_interval = Duration::from_secs(secs);
        }
        if let Some(bytes) = parse(STORAGE_BUDGET_ENV).filter(|v| *v > 0) {
            config.storage_budget_bytes = bytes as usize;
        }
        config
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_sync_jitter(mut self, jitter: Duration) -> Self {
        self.sync_jitter = jitter;
        self
    }

    pub fn with_storage_budget(mut self, bytes: usize) -> Self {
        self.storage_budget_bytes = bytes;
        self
    }
}
