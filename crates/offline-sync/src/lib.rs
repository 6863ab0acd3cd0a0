//! Offline-first mutation queue for GreenMate.
//!
//! Callers enqueue creates, updates and deletes while the network may be
//! unavailable. The queue persists them through a
//! [`greenmate_core::storage::KeyValueStore`], replays them against the REST
//! API in priority order once online, retries failures a bounded number of
//! times, and publishes [`greenmate_core::sync::OfflineState`] snapshots for
//! the UI.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use greenmate_core::{network::NetworkStatus, storage::MemoryStore};
//! use greenmate_offline_sync::{add_care_log, SyncConfig, SyncContext};
//!
//! let context = SyncContext::with_http_transport(
//!     SyncConfig::from_env(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(NetworkStatus::new(true)),
//! );
//! context.start_background_sync().await;
//! let optimistic = add_care_log(&context.queue(), care_log);
//! ```

mod client;
mod config;
mod context;
mod engine;
mod error;
mod helpers;
mod queue;
mod types;

pub use client::{
    HttpSyncClient, StaticTokenProvider, StoredTokenProvider, SyncTransport, TokenProvider,
    DEFAULT_TIMEOUT_SECS, DEFAULT_TOKEN_KEY,
};
pub use config::SyncConfig;
pub use context::SyncContext;
pub use engine::{ensure_background_engine_started, ensure_background_engine_stopped, SyncRuntimeState};
pub use error::{Result, SyncError};
pub use helpers::{
    add_care_log, add_comment, add_note, add_photo, add_plant, add_post, add_reminder,
    generate_temp_id, is_temp_id, TEMP_ID_PREFIX,
};
pub use queue::{OfflineSyncQueue, Subscription, LAST_SYNC_STORAGE_KEY, QUEUE_STORAGE_KEY};
pub use types::{
    SyncMethod, SyncRequest, SyncResponse, OFFLINE_SYNC_FIELD, ORIGINAL_TIMESTAMP_FIELD,
};
