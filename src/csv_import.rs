//! Parses CSV exports into candidate transactions for bulk ingestion.

use serde::Deserialize;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    transaction::{Transaction, TransactionBuilder},
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    amount: f64,
    category: String,
    #[serde(default)]
    description: String,
}

/// Parses CSV text with the header `date,amount,category,description`.
///
/// Dates must be formatted as `YYYY-MM-DD` and the description column may be
/// left empty. Amounts and categories are not validated here, the budget gate
/// rejects bad rows individually when the batch is ingested.
///
/// # Errors
/// Returns [Error::InvalidCSV] naming the line of the first row that cannot be
/// parsed.
pub fn parse_transactions_csv(text: &str) -> Result<Vec<TransactionBuilder>, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|error| Error::InvalidCSV(format!("line 1: {error}")))?
        .clone();
    let mut transactions = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|error| {
            let line = error
                .position()
                .map_or_else(|| "?".to_owned(), |position| position.line().to_string());
            Error::InvalidCSV(format!("line {line}: {error}"))
        })?;
        let line = record.position().map_or(0, |position| position.line());

        let row: CsvRow = record
            .deserialize(Some(&headers))
            .map_err(|error| Error::InvalidCSV(format!("line {line}: {error}")))?;

        let date = Date::parse(&row.date, DATE_FORMAT).map_err(|error| {
            Error::InvalidCSV(format!("line {line}: invalid date {:?}: {error}", row.date))
        })?;

        let builder = Transaction::build(row.amount, &row.category, date);
        transactions.push(builder.description(&row.description));
    }

    tracing::debug!("parsed {} transactions from CSV", transactions.len());

    Ok(transactions)
}
