//! Implements a SQLite backed transaction store.

use std::{
    ops::RangeInclusive,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::{Connection, Row};
use time::Date;

use crate::{
    Error,
    database_id::TransactionId,
    stores::TransactionStore,
    transaction::{Transaction, TransactionBuilder},
};

/// Stores transactions in a SQLite database.
///
/// Every method takes the connection lock for a single statement only, so a
/// read followed by a write from the same caller may interleave with other
/// callers.
#[derive(Debug, Clone)]
pub struct SQLiteTransactionStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteTransactionStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

impl TransactionStore for SQLiteTransactionStore {
    /// Create a new transaction in the database.
    ///
    /// # Errors
    /// This function will return a [Error::SqlError] if there is some SQL error.
    fn create(&self, builder: TransactionBuilder) -> Result<Transaction, Error> {
        let connection = self.lock()?;

        connection.execute(
            "INSERT INTO \"transaction\" (amount, category, description, date)
             VALUES (?1, ?2, ?3, ?4)",
            (
                builder.amount,
                &builder.category,
                &builder.description,
                builder.date,
            ),
        )?;

        let id = connection.last_insert_rowid();

        Ok(builder.finalise(id))
    }

    /// Retrieve a transaction in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid transaction,
    /// - or [Error::SqlError] there is some other SQL error.
    fn get(&self, id: TransactionId) -> Result<Transaction, Error> {
        let transaction = self
            .lock()?
            .prepare(
                "SELECT id, amount, category, description, date FROM \"transaction\" WHERE id = :id",
            )?
            .query_row(&[(":id", &id)], map_transaction_row)?;

        Ok(transaction)
    }

    fn get_all(&self) -> Result<Vec<Transaction>, Error> {
        self.lock()?
            .prepare(
                "SELECT id, amount, category, description, date FROM \"transaction\"
                 ORDER BY date DESC, id DESC",
            )?
            .query_map([], map_transaction_row)?
            .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
            .collect()
    }

    fn sum_by_category(
        &self,
        category: &str,
        date_range: Option<RangeInclusive<Date>>,
    ) -> Result<f64, Error> {
        let connection = self.lock()?;

        let total = match date_range {
            Some(date_range) => connection.query_row(
                "SELECT COALESCE(SUM(amount), 0.0) FROM \"transaction\"
                 WHERE category = ?1 AND date BETWEEN ?2 AND ?3",
                (category, date_range.start(), date_range.end()),
                |row| row.get(0),
            )?,
            None => connection.query_row(
                "SELECT COALESCE(SUM(amount), 0.0) FROM \"transaction\" WHERE category = ?1",
                (category,),
                |row| row.get(0),
            )?,
        };

        Ok(total)
    }

    fn distinct_categories(&self, date_range: RangeInclusive<Date>) -> Result<Vec<String>, Error> {
        self.lock()?
            .prepare(
                "SELECT DISTINCT category FROM \"transaction\"
                 WHERE date BETWEEN ?1 AND ?2 ORDER BY category ASC",
            )?
            .query_map((date_range.start(), date_range.end()), |row| row.get(0))?
            .map(|maybe_category| maybe_category.map_err(|error| error.into()))
            .collect()
    }
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL,
                date TEXT NOT NULL
                )",
        (),
    )?;

    // Used by both the admission check and the summary queries.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_category_date ON \"transaction\"(category, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = row.get(1)?;
    let category = row.get(2)?;
    let description = row.get(3)?;
    let date = row.get(4)?;

    Ok(Transaction {
        id,
        amount,
        category,
        description,
        date,
    })
}
