//! Defines the core data models for transactions.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, database_id::TransactionId};

/// An expense recorded against a category budget.
///
/// Transactions are immutable once committed. To create a candidate
/// transaction that has not been committed yet, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID assigned by the transaction store on commit.
    pub id: TransactionId,
    /// The amount of money spent, always positive.
    pub amount: f64,
    /// The name of the budget category the transaction counts against.
    pub category: String,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    pub date: Date,
}

impl Transaction {
    /// Create a new candidate transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(amount: f64, category: &str, date: Date) -> TransactionBuilder {
        TransactionBuilder {
            amount,
            category: category.to_owned(),
            description: String::new(),
            date,
        }
    }
}

/// A transaction that has been submitted but not committed.
///
/// The builder carries no ID; one is assigned by the
/// [TransactionStore](crate::stores::TransactionStore) when the transaction is
/// committed.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TransactionBuilder {
    /// The amount of money spent.
    ///
    /// Must be strictly positive to pass validation.
    pub amount: f64,

    /// The budget category, e.g. "Food", "Transport", "Rent".
    ///
    /// Must not be empty (or only whitespace) to pass validation.
    pub category: String,

    /// A human-readable description of the transaction.
    pub description: String,

    /// The date when the transaction occurred.
    pub date: Date,
}

impl TransactionBuilder {
    /// Set the description for the transaction.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    /// Check the shape of the transaction.
    ///
    /// NaN amounts fail the positivity check.
    ///
    /// # Errors
    /// Returns [Error::InvalidTransaction] if the amount is not strictly
    /// positive or the category is empty.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.amount > 0.0) || self.category.trim().is_empty() {
            return Err(Error::InvalidTransaction);
        }

        Ok(())
    }

    /// Attach the store-assigned `id`, producing the committed transaction.
    pub fn finalise(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            amount: self.amount,
            category: self.category,
            description: self.description,
            date: self.date,
        }
    }
}
