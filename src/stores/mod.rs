//! Contains traits and implementations for objects that store the ledger's
//! [budgets](crate::Budget) and [transactions](crate::Transaction).

mod budget;
mod transaction;

pub mod sqlite;

pub use budget::BudgetStore;
pub use transaction::TransactionStore;
