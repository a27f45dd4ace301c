//! Defines the budget store trait.

use crate::{Budget, Error};

/// Handles the creation and retrieval of category budgets.
///
/// Implementations must be safe to share between the ledger's worker tasks.
pub trait BudgetStore: Send + Sync {
    /// Retrieve the budget for `category`.
    ///
    /// # Errors
    /// Implementers should return [Error::NotFound] if there is no budget for
    /// `category`, any other error is reported to callers verbatim.
    fn get(&self, category: &str) -> Result<Budget, Error>;

    /// Insert `budget`, or replace the limit if the category already has one.
    fn upsert(&self, budget: &Budget) -> Result<(), Error>;

    /// Retrieve every budget ordered by category.
    fn get_all(&self) -> Result<Vec<Budget>, Error>;
}
