//! SQLite persistence for the offline sync key-value blobs.

mod model;
mod repository;

pub use model::KvEntryDB;
pub use repository::SqliteKeyValueStore;
