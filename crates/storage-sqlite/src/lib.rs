//! SQLite persistence for the GreenMate offline sync queue.
//!
//! Provides [`SqliteKeyValueStore`], a durable implementation of
//! [`greenmate_core::storage::KeyValueStore`] with a byte-capacity quota.

pub mod db;
pub mod errors;
pub mod kv_store;
pub mod schema;

pub use db::{create_pool, get_connection, init, run_migrations};
pub use kv_store::SqliteKeyValueStore;
