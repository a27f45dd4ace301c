//! Defines the cache trait used by the ledger's read paths and an in-process
//! implementation.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use crate::Error;

/// A key-value store whose entries expire after a time-to-live.
///
/// The ledger treats every error from a cache as a miss, so implementations
/// may fail freely without affecting correctness.
pub trait Cache: Send + Sync {
    /// Get the value stored under `key`, or `None` on a miss or expired entry.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Store `value` under `key` for `ttl`, replacing any existing entry.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), Error>;

    /// Remove the entry stored under `key`, if any.
    fn delete(&self, key: &str) -> Result<(), Error>;
}

#[derive(Debug)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// A [Cache] that keeps entries in memory.
///
/// Expired entries are evicted lazily when they are read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CacheEntry>>, Error> {
        self.entries
            .lock()
            .map_err(|error| Error::CacheError(format!("could not acquire cache lock: {error}")))
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let mut entries = self.lock()?;

        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), Error> {
        let expires_at = Instant::now() + ttl;

        self.lock()?
            .insert(key.to_owned(), CacheEntry { value, expires_at });

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        self.lock()?.remove(key);

        Ok(())
    }
}
