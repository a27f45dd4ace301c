//! Per-category locks used to serialize admissions.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

/// Hands out one mutex per category name.
///
/// Locks are created on first use and never removed, which is fine for the
/// small, slowly growing set of budget categories.
#[derive(Debug, Default, Clone)]
pub(crate) struct CategoryLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl CategoryLocks {
    /// Get the lock for `category`.
    pub(crate) fn get(&self, category: &str) -> Arc<Mutex<()>> {
        // Holders of the map lock never panic while holding it, so a poisoned
        // map is still consistent.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

        locks.entry(category.to_owned()).or_default().clone()
    }
}
