//! Ledger is a budget-enforcing expense ledger.
//!
//! Transactions are only committed if they keep their category within its
//! budget. Batches of transactions can be ingested concurrently with
//! [Ledger::bulk_add], and per-category spending totals are served through a
//! cache by [Ledger::summary].
//!
//! This library provides the [Ledger] itself, SQLite backed stores and caches
//! that live either in the database or in memory. The `ledger` binary exposes
//! it as a command line tool.

#![warn(missing_docs)]

mod budget;
mod cache;
mod cancellation;
mod config;
mod csv_import;
mod database_id;
mod db;
mod error;
mod ledger;
pub mod stores;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use budget::Budget;
pub use cache::{Cache, MemoryCache};
pub use cancellation::{Cancellation, CancellationHandle, cancellation};
pub use config::{AdmissionMode, DEFAULT_CACHE_TTL, LedgerConfig, SpendScope};
pub use csv_import::parse_transactions_csv;
pub use database_id::{DatabaseId, TransactionId};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use ledger::{BUDGETS_CACHE_KEY, BulkResult, Ledger, Summary, admit, summary_cache_key};
pub use stores::sqlite::create_ledger;
pub use transaction::{Transaction, TransactionBuilder};
