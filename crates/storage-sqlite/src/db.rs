//! Database bootstrap: file location, pooled connections, schema migrations.

use std::path::Path;
use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::debug;

use crate::errors::StorageError;

const DB_FILE_NAME: &str = "greenmate-offline.db";
const POOL_SIZE: u32 = 4;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Per-connection settings for synchronous durable writes.
#[derive(Debug)]
struct ConnectionOptions;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(r2d2::Error::QueryError)
    }
}

/// Ensure the app data directory exists and return the database path inside it.
pub fn init(app_data_dir: impl AsRef<Path>) -> Result<String, StorageError> {
    let dir = app_data_dir.as_ref();
    std::fs::create_dir_all(dir)?;
    Ok(dir.join(DB_FILE_NAME).to_string_lossy().to_string())
}

/// Apply pending schema migrations. Safe to call on every start.
pub fn run_migrations(db_path: &str) -> Result<(), StorageError> {
    let mut conn = SqliteConnection::establish(db_path)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    for version in applied {
        debug!("Applied migration {}", version);
    }
    Ok(())
}

pub fn create_pool(
    db_path: &str,
) -> Result<Arc<Pool<ConnectionManager<SqliteConnection>>>, StorageError> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)?;
    Ok(Arc::new(pool))
}

pub fn get_connection(
    pool: &Pool<ConnectionManager<SqliteConnection>>,
) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>, StorageError> {
    Ok(pool.get()?)
}
