//! The summary aggregator: per-category spending totals for a date range,
//! served through the cache.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::Date;
use tokio::task::JoinSet;

use crate::{Error, Ledger, cancellation::Cancellation};

/// Total spending per category over a date range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// The total amount spent in each category that has at least one
    /// transaction in the range.
    pub categories: BTreeMap<String, f64>,
    /// Whether the totals were served from the cache.
    #[serde(skip)]
    pub from_cache: bool,
}

/// The cache key for the summary of `from..=to`.
pub fn summary_cache_key(from: Date, to: Date) -> String {
    format!("report:summary:{from}:{to}")
}

impl Ledger {
    /// Total spending per category for transactions dated in `from..=to`.
    ///
    /// A cached summary is returned as-is while it is fresh. Otherwise the
    /// categories in the range are found and each category is totalled in
    /// its own task, and the result is cached for the configured TTL. A range
    /// with no transactions produces an empty summary.
    ///
    /// Cache failures are logged and treated as a miss. Concurrent misses for
    /// the same range each compute the summary.
    ///
    /// # Errors
    /// Returns the store's error if finding the categories or totalling any
    /// category fails. Nothing is cached in that case.
    pub async fn summary(&self, from: Date, to: Date) -> Result<Summary, Error> {
        self.summary_with_cancellation(from, to, Cancellation::never()).await
    }

    /// Like [summary](Ledger::summary), but stops early with
    /// [Error::Cancelled] when `cancellation` fires before the totals are
    /// computed.
    ///
    /// Stopping aborts any per-category tasks that have not started yet;
    /// store calls already in progress run to completion in the background.
    pub async fn summary_with_cancellation(
        &self,
        from: Date,
        to: Date,
        mut cancellation: Cancellation,
    ) -> Result<Summary, Error> {
        let key = summary_cache_key(from, to);

        let cached = self
            .run_blocking({
                let key = key.clone();
                move |ledger| Ok(ledger.read_cache::<BTreeMap<String, f64>>(&key))
            })
            .await?;

        if let Some(categories) = cached {
            return Ok(Summary {
                categories,
                from_cache: true,
            });
        }

        let categories = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                tracing::debug!("summary for {from} to {to} cancelled");
                return Err(Error::Cancelled);
            }
            categories = self.compute_summary(from, to) => categories?,
        };

        self.run_blocking({
            let categories = categories.clone();
            move |ledger| {
                ledger.write_cache(&key, &categories);
                Ok(())
            }
        })
        .await?;

        Ok(Summary {
            categories,
            from_cache: false,
        })
    }

    async fn compute_summary(&self, from: Date, to: Date) -> Result<BTreeMap<String, f64>, Error> {
        let categories = self
            .run_blocking(move |ledger| ledger.transactions.distinct_categories(from..=to))
            .await?;

        tracing::debug!(
            "totalling {} categories for {from} to {to}",
            categories.len()
        );

        let mut tasks = JoinSet::new();

        for category in categories {
            let ledger = self.clone();
            tasks.spawn_blocking(move || {
                let total = ledger
                    .transactions
                    .sum_by_category(&category, Some(from..=to))?;
                Ok::<_, Error>((category, total))
            });
        }

        let mut totals = BTreeMap::new();

        // Returning early drops `tasks`, which aborts the remaining tasks.
        while let Some(joined) = tasks.join_next().await {
            let (category, total) = joined??;
            totals.insert(category, total);
        }

        Ok(totals)
    }
}
