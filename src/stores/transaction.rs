//! Defines the transaction store trait.

use std::ops::RangeInclusive;

use time::Date;

use crate::{
    Error,
    database_id::TransactionId,
    transaction::{Transaction, TransactionBuilder},
};

/// Handles the creation, retrieval and aggregation of committed transactions.
///
/// Implementations must be safe to share between the ledger's worker tasks.
pub trait TransactionStore: Send + Sync {
    /// Commit a new transaction to the store and return it with its ID.
    fn create(&self, builder: TransactionBuilder) -> Result<Transaction, Error>;

    /// Retrieve a transaction from the store.
    ///
    /// # Errors
    /// Implementers should return [Error::NotFound] if `id` does not refer to
    /// a committed transaction.
    fn get(&self, id: TransactionId) -> Result<Transaction, Error>;

    /// Retrieve all transactions, newest first.
    fn get_all(&self) -> Result<Vec<Transaction>, Error>;

    /// Sum the amounts of the transactions in `category`.
    ///
    /// If `date_range` is `None` every transaction in the category is
    /// included, otherwise only those dated within `date_range` (inclusive).
    /// Returns zero for a category with no transactions.
    fn sum_by_category(
        &self,
        category: &str,
        date_range: Option<RangeInclusive<Date>>,
    ) -> Result<f64, Error>;

    /// The distinct categories with at least one transaction dated within
    /// `date_range` (inclusive).
    fn distinct_categories(&self, date_range: RangeInclusive<Date>) -> Result<Vec<String>, Error>;
}
