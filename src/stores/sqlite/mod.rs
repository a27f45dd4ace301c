//! Contains the SQLite backed stores and cache, and a convenience function for
//! building a [Ledger] on top of them.

pub mod budget;
pub mod cache;
pub mod transaction;

pub use budget::SQLiteBudgetStore;
pub use cache::SQLiteCache;
pub use transaction::SQLiteTransactionStore;

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, Ledger, LedgerConfig, db::initialize};

/// Creates a [Ledger] that uses SQLite for both stores and the cache.
///
/// Cached summaries and budget lists are kept in the database, so they are
/// shared by every ledger opened on the same database file until they expire.
///
/// This function will modify the database by adding the tables for the domain
/// models to the database.
///
/// # Errors
/// Returns an error if the database cannot be initialized.
pub fn create_ledger(db_connection: Connection, config: LedgerConfig) -> Result<Ledger, Error> {
    initialize(&db_connection)?;

    Ok(ledger_on(Arc::new(Mutex::new(db_connection)), config))
}

fn ledger_on(connection: Arc<Mutex<Connection>>, config: LedgerConfig) -> Ledger {
    Ledger::new(
        Arc::new(SQLiteBudgetStore::new(connection.clone())),
        Arc::new(SQLiteTransactionStore::new(connection.clone())),
        Arc::new(SQLiteCache::new(connection)),
        config,
    )
}
