//! Implements a SQLite backed budget store.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Row};

use crate::{Budget, Error, stores::BudgetStore};

/// Stores budgets in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteBudgetStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteBudgetStore {
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

impl BudgetStore for SQLiteBudgetStore {
    /// Retrieve the budget for `category`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `category` has no budget,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn get(&self, category: &str) -> Result<Budget, Error> {
        let connection = self.lock()?;

        connection
            .prepare("SELECT category, limit_amount FROM budget WHERE category = :category")?
            .query_row(&[(":category", category)], map_row)
            .map_err(|error| error.into())
    }

    fn upsert(&self, budget: &Budget) -> Result<(), Error> {
        let connection = self.lock()?;

        connection.execute(
            "INSERT INTO budget (category, limit_amount) VALUES (?1, ?2)
             ON CONFLICT(category) DO UPDATE SET limit_amount = excluded.limit_amount",
            (&budget.category, budget.limit),
        )?;

        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Budget>, Error> {
        let connection = self.lock()?;

        connection
            .prepare("SELECT category, limit_amount FROM budget ORDER BY category ASC")?
            .query_map([], map_row)?
            .map(|maybe_budget| maybe_budget.map_err(|error| error.into()))
            .collect()
    }
}

/// Create the budget table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                category TEXT PRIMARY KEY,
                limit_amount REAL NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    let category = row.get(0)?;
    let limit = row.get(1)?;

    Ok(Budget { category, limit })
}
