use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::SqliteConnection;
use log::warn;

use greenmate_core::storage::KeyValueStore;
use greenmate_core::Result;

use super::model::KvEntryDB;
use crate::db::{create_pool, get_connection, init, run_migrations};
use crate::errors::StorageError;
use crate::schema::kv_store;

#[derive(diesel::QueryableByName)]
struct StoredBytesRow {
    #[diesel(sql_type = BigInt)]
    bytes: i64,
}

/// Bytes held by every value except the one stored under `excluding`.
fn stored_bytes(
    conn: &mut SqliteConnection,
    excluding: Option<&str>,
) -> std::result::Result<usize, StorageError> {
    let row = match excluding {
        Some(key) => diesel::sql_query(
            "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) AS bytes FROM kv_store WHERE key != ?",
        )
        .bind::<Text, _>(key)
        .get_result::<StoredBytesRow>(conn)?,
        None => diesel::sql_query(
            "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) AS bytes FROM kv_store",
        )
        .get_result::<StoredBytesRow>(conn)?,
    };
    Ok(usize::try_from(row.bytes).unwrap_or(0))
}

/// Durable [`KeyValueStore`] backed by a single SQLite table.
///
/// Every `set` commits before returning. When a capacity is configured, the
/// sum of stored value sizes (in bytes) may never exceed it.
pub struct SqliteKeyValueStore {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    capacity: Option<usize>,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>) -> Self {
        Self {
            pool,
            capacity: None,
        }
    }

    /// Open (or create) the store inside `app_data_dir`.
    pub fn open(app_data_dir: impl AsRef<Path>) -> Result<Self> {
        let db_path = init(app_data_dir)?;
        run_migrations(&db_path)?;
        let pool = create_pool(&db_path)?;
        Ok(Self::new(pool))
    }

    pub fn with_capacity(mut self, capacity_bytes: usize) -> Self {
        self.capacity = Some(capacity_bytes);
        self
    }

    /// Bytes currently stored across all keys.
    pub fn used_bytes(&self) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        Ok(stored_bytes(&mut conn, None)?)
    }

    pub fn entry(&self, key: &str) -> Result<Option<KvEntryDB>> {
        let mut conn = get_connection(&self.pool)?;
        let row = kv_store::table
            .find(key)
            .select(KvEntryDB::as_select())
            .first::<KvEntryDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entry(key)?.map(|entry| entry.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        let capacity = self.capacity;

        conn.immediate_transaction::<_, StorageError, _>(|conn| {
            if let Some(capacity) = capacity {
                let requested = stored_bytes(conn, Some(key))? + value.len();
                if requested > capacity {
                    warn!(
                        "SQLite store rejected write for '{}': {} bytes over capacity {}",
                        key, requested, capacity
                    );
                    return Err(StorageError::QuotaExceeded {
                        requested,
                        capacity,
                    });
                }
            }

            let row = KvEntryDB {
                key: key.to_string(),
                value: value.to_string(),
                updated_at: Utc::now().to_rfc3339(),
            };
            diesel::insert_into(kv_store::table)
                .values(&row)
                .on_conflict(kv_store::key)
                .do_update()
                .set((
                    kv_store::value.eq(&row.value),
                    kv_store::updated_at.eq(&row.updated_at),
                ))
                .execute(conn)?;
            Ok(())
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        diesel::delete(kv_store::table.find(key))
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel_migrations::MigrationHarness;
    use tempfile::tempdir;

    use crate::db::MIGRATIONS;

    #[test]
    fn values_survive_reopen() {
        let dir = tempdir().expect("tempdir");
        {
            let store = SqliteKeyValueStore::open(dir.path()).expect("open store");
            store.set("greenmate_offline_queue", "[1,2,3]").expect("set");
        }

        let reopened = SqliteKeyValueStore::open(dir.path()).expect("reopen store");
        assert_eq!(
            reopened.get("greenmate_offline_queue").expect("get").as_deref(),
            Some("[1,2,3]")
        );
    }

    #[test]
    fn set_overwrites_and_stamps_entry() {
        let dir = tempdir().expect("tempdir");
        let store = SqliteKeyValueStore::open(dir.path()).expect("open store");

        store.set("k", "first").expect("set first");
        store.set("k", "second").expect("set second");

        let entry = store.entry("k").expect("entry").expect("row exists");
        assert_eq!(entry.value, "second");
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.updated_at).is_ok());
    }

    #[test]
    fn remove_deletes_key() {
        let dir = tempdir().expect("tempdir");
        let store = SqliteKeyValueStore::open(dir.path()).expect("open store");

        store.set("k", "v").expect("set");
        store.remove("k").expect("remove");
        store.remove("missing").expect("remove missing is a no-op");
        assert_eq!(store.get("k").expect("get"), None);
    }

    #[test]
    fn capacity_rejects_oversized_write_and_keeps_previous_value() {
        let dir = tempdir().expect("tempdir");
        let store = SqliteKeyValueStore::open(dir.path())
            .expect("open store")
            .with_capacity(16);

        store.set("queue", "0123456789").expect("fits");
        store.set("token", "abc").expect("fits");

        let err = store.set("queue", "0123456789abcdef").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.get("queue").expect("get").as_deref(), Some("0123456789"));
        assert_eq!(store.used_bytes().expect("used"), 13);
    }

    #[test]
    fn migrations_are_idempotent() {
        let dir = tempdir().expect("tempdir");
        let db_path = init(dir.path()).expect("init db");
        run_migrations(&db_path).expect("first run");
        run_migrations(&db_path).expect("second run");

        let pool = create_pool(&db_path).expect("create pool");
        let mut conn = get_connection(&pool).expect("conn");
        assert!(conn
            .pending_migrations(MIGRATIONS)
            .expect("pending")
            .is_empty());
        assert_eq!(conn.applied_migrations().expect("applied").len(), 1);
    }

    #[test]
    fn pooled_store_shares_rows_across_handles() {
        let dir = tempdir().expect("tempdir");
        let db_path = init(dir.path()).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        let pool = create_pool(&db_path).expect("create pool");

        let writer = SqliteKeyValueStore::new(pool.clone());
        let reader = SqliteKeyValueStore::new(pool);
        writer.set("auth_token", "jwt").expect("set");

        assert_eq!(reader.get("auth_token").expect("get").as_deref(), Some("jwt"));
    }
}
