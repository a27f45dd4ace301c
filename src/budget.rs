//! Defines the budget model.

use serde::{Deserialize, Serialize};

use crate::Error;

/// A spending limit associated with one category.
///
/// There is at most one budget per category, setting a budget for a category
/// that already has one replaces the old limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// The category name, unique across budgets.
    pub category: String,
    /// The maximum total amount that may be spent in the category.
    pub limit: f64,
}

impl Budget {
    /// Create a budget after checking that `limit` is positive and `category`
    /// is not empty.
    ///
    /// # Errors
    /// Returns [Error::InvalidBudget] if either field is invalid.
    pub fn new(category: &str, limit: f64) -> Result<Self, Error> {
        let budget = Self {
            category: category.to_owned(),
            limit,
        };
        budget.validate()?;

        Ok(budget)
    }

    /// Check the budget fields.
    ///
    /// # Errors
    /// Returns [Error::InvalidBudget] if the limit is not strictly positive or
    /// the category is empty.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.limit > 0.0) {
            return Err(Error::InvalidBudget("limit must be positive".to_owned()));
        }

        if self.category.trim().is_empty() {
            return Err(Error::InvalidBudget(
                "category must not be empty".to_owned(),
            ));
        }

        Ok(())
    }
}
