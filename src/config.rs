//! Configuration for a [Ledger](crate::Ledger).

use std::{ops::RangeInclusive, time::Duration};

use time::Date;

use crate::Error;

/// How long report summaries and the budget list stay cached by default.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Settings shared by the single-add, bulk and summary paths.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Which committed transactions count as already spent during admission.
    pub spend_scope: SpendScope,
    /// Whether admissions in the same category are serialized.
    pub admission_mode: AdmissionMode,
    /// How long cached read results remain valid.
    pub cache_ttl: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            spend_scope: SpendScope::Lifetime,
            admission_mode: AdmissionMode::Unserialized,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// The period over which spending is totalled when checking a budget.
///
/// The same scope is applied to every admission made by a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SpendScope {
    /// Every committed transaction in the category counts.
    #[default]
    Lifetime,
    /// Only transactions in the same calendar month as the candidate count.
    Month,
}

impl SpendScope {
    /// The date range to total for a transaction dated `date`, where `None`
    /// means no date restriction.
    ///
    /// # Errors
    /// Returns [Error::InvalidDate] if the month boundaries cannot be computed.
    pub fn date_range(self, date: Date) -> Result<Option<RangeInclusive<Date>>, Error> {
        match self {
            SpendScope::Lifetime => Ok(None),
            SpendScope::Month => {
                let invalid = |_| Error::InvalidDate(date.to_string());
                let last_day = date.month().length(date.year());
                let start = date.replace_day(1).map_err(invalid)?;
                let end = date.replace_day(last_day).map_err(invalid)?;

                Ok(Some(start..=end))
            }
        }
    }
}

/// Controls whether the check-then-commit sequence is atomic per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AdmissionMode {
    /// Admissions run without coordination.
    ///
    /// Two concurrent jobs in the same category can both read the same
    /// spent amount before either commits, so the category can end up over
    /// its limit.
    #[default]
    Unserialized,
    /// Admission and commit hold a per-category lock, so a category can never
    /// be overcommitted by this ledger.
    PerCategory,
}
