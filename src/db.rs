//! Creates the ledger's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error,
    stores::sqlite::{
        budget::create_budget_table, cache::create_cache_table,
        transaction::create_transaction_table,
    },
};

/// Create the tables for the budget and transaction stores and the cache.
///
/// Safe to call on a database that has already been initialized.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_budget_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_cache_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
