//! Implements a SQLite backed cache whose entries outlive the process.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use rusqlite::{Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::{Error, cache::Cache};

/// Stores cache entries in a SQLite table.
///
/// Expiry times are wall-clock milliseconds since the Unix epoch, so entries
/// remain valid across runs of the program that share a database file.
/// Expired entries are deleted when they are read.
#[derive(Debug, Clone)]
pub struct SQLiteCache {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteCache {
    /// Create a new cache for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::CacheError("could not acquire the database lock".to_owned())
        })
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn cache_error(error: rusqlite::Error) -> Error {
    Error::CacheError(error.to_string())
}

impl Cache for SQLiteCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let connection = self.lock()?;

        let entry: Option<(Vec<u8>, i64)> = connection
            .query_row(
                "SELECT value, expires_at FROM cache WHERE key = ?1",
                (key,),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(cache_error)?;

        match entry {
            Some((value, expires_at)) if expires_at > now_millis() => Ok(Some(value)),
            Some(_) => {
                connection
                    .execute("DELETE FROM cache WHERE key = ?1", (key,))
                    .map_err(cache_error)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), Error> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_millis().saturating_add(ttl_millis);

        self.lock()?
            .execute(
                "INSERT INTO cache (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                 expires_at = excluded.expires_at",
                (key, value, expires_at),
            )
            .map_err(cache_error)?;

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        self.lock()?
            .execute("DELETE FROM cache WHERE key = ?1", (key,))
            .map_err(cache_error)?;

        Ok(())
    }
}

/// Create the cache table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_cache_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER NOT NULL
                )",
        (),
    )?;

    Ok(())
}
