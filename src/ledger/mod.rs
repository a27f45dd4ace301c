//! The ledger owns the budget and transaction stores and the cache, and
//! implements every operation that reads or writes budget state.
//!
//! The two concurrent entry points live in their own modules:
//! [bulk](Ledger::bulk_add) ingestion and the cache-aside
//! [summary](Ledger::summary) aggregator. Both share the [gate](admit) with
//! the single-transaction path so that every admission uses the same
//! [SpendScope](crate::SpendScope).

mod bulk;
mod gate;
mod locks;
mod summary;

pub use bulk::BulkResult;
pub use gate::admit;
pub use summary::{Summary, summary_cache_key};

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    AdmissionMode, Budget, Error, LedgerConfig,
    cache::Cache,
    database_id::TransactionId,
    ledger::locks::CategoryLocks,
    stores::{BudgetStore, TransactionStore},
    transaction::{Transaction, TransactionBuilder},
};

/// The cache key for the list of all budgets.
pub const BUDGETS_CACHE_KEY: &str = "budgets:all";

/// Records transactions against category budgets and produces summaries.
///
/// Cloning a ledger is cheap and every clone shares the same stores, cache
/// and category locks.
#[derive(Clone)]
pub struct Ledger {
    budgets: Arc<dyn BudgetStore>,
    transactions: Arc<dyn TransactionStore>,
    cache: Arc<dyn Cache>,
    config: LedgerConfig,
    category_locks: CategoryLocks,
    /// Bumped whenever the cached budget list is invalidated.
    budgets_generation: Arc<Mutex<u64>>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create a ledger over the given stores and cache.
    pub fn new(
        budgets: Arc<dyn BudgetStore>,
        transactions: Arc<dyn TransactionStore>,
        cache: Arc<dyn Cache>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            budgets,
            transactions,
            cache,
            config,
            category_locks: CategoryLocks::default(),
            budgets_generation: Arc::default(),
        }
    }

    /// The configuration this ledger was created with.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Insert or replace the budget for a category.
    ///
    /// The cached budget list is invalidated after a successful write.
    ///
    /// # Errors
    /// Returns [Error::InvalidBudget] if the budget fails validation, or the
    /// store's error if the write fails.
    pub async fn set_budget(&self, budget: Budget) -> Result<(), Error> {
        budget.validate()?;

        self.run_blocking(move |ledger| {
            ledger.budgets.upsert(&budget)?;
            tracing::info!("set budget for {} to {}", budget.category, budget.limit);

            let mut generation = ledger.lock_budgets_generation();
            ledger.invalidate_cache(BUDGETS_CACHE_KEY);
            *generation += 1;

            Ok(())
        })
        .await
    }

    /// Get the budget for `category`.
    ///
    /// # Errors
    /// Returns [Error::NoBudgetCategory] if the category has no budget.
    pub async fn get_budget(&self, category: &str) -> Result<Budget, Error> {
        let category = category.to_owned();

        self.run_blocking(move |ledger| {
            ledger.budgets.get(&category).map_err(|error| match error {
                Error::NotFound => Error::NoBudgetCategory,
                error => error,
            })
        })
        .await
    }

    /// Get every budget keyed by category.
    ///
    /// Reads through the cache, see [BUDGETS_CACHE_KEY]. A list read from the
    /// store is not cached if a budget was set by this ledger (or a clone of
    /// it) while the list was being read.
    pub async fn list_budgets(&self) -> Result<BTreeMap<String, Budget>, Error> {
        self.run_blocking(|ledger| {
            let budgets = match ledger.read_cache::<Vec<Budget>>(BUDGETS_CACHE_KEY) {
                Some(budgets) => budgets,
                None => {
                    let start_generation = *ledger.lock_budgets_generation();
                    let budgets = ledger.budgets.get_all()?;

                    let generation = ledger.lock_budgets_generation();
                    if *generation == start_generation {
                        ledger.write_cache(BUDGETS_CACHE_KEY, &budgets);
                    } else {
                        tracing::debug!("budgets changed while listing, not caching the list");
                    }

                    budgets
                }
            };

            Ok(budgets
                .into_iter()
                .map(|budget| (budget.category.clone(), budget))
                .collect())
        })
        .await
    }

    /// Check a single transaction against its budget and commit it.
    ///
    /// Uses the same admission check and spend scope as
    /// [bulk_add](Ledger::bulk_add).
    ///
    /// # Errors
    /// Returns the rejection reason from [admit] or the store's error if the
    /// commit fails.
    pub async fn add_transaction(&self, builder: TransactionBuilder) -> Result<Transaction, Error> {
        self.run_blocking(move |ledger| ledger.admit_and_commit(builder))
            .await
            .inspect(|transaction| {
                tracing::info!(
                    "committed transaction {} of {} in {}",
                    transaction.id,
                    transaction.amount,
                    transaction.category
                )
            })
    }

    /// Get a committed transaction by its ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if `id` does not refer to a transaction.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, Error> {
        self.run_blocking(move |ledger| ledger.transactions.get(id)).await
    }

    /// Get every committed transaction, newest first.
    pub async fn list_transactions(&self) -> Result<Vec<Transaction>, Error> {
        self.run_blocking(|ledger| ledger.transactions.get_all()).await
    }

    /// Run the admission check and, if it passes, commit the transaction.
    ///
    /// In [AdmissionMode::PerCategory] the category lock is held from before
    /// the check until after the commit. Blocks the calling thread.
    fn admit_and_commit(&self, builder: TransactionBuilder) -> Result<Transaction, Error> {
        let category_lock = match self.config.admission_mode {
            AdmissionMode::Unserialized => None,
            AdmissionMode::PerCategory => Some(self.category_locks.get(&builder.category)),
        };
        let _guard = category_lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));

        admit(
            &builder,
            self.config.spend_scope,
            self.budgets.as_ref(),
            self.transactions.as_ref(),
        )?;

        self.transactions.create(builder)
    }

    fn lock_budgets_generation(&self) -> MutexGuard<'_, u64> {
        // A plain counter cannot be left inconsistent by a panic.
        self.budgets_generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the synchronous store and cache calls in `f` on the blocking pool.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(Ledger) -> Result<T, Error> + Send + 'static,
    {
        let ledger = self.clone();

        tokio::task::spawn_blocking(move || f(ledger)).await?
    }

    /// Read and decode a cached value.
    ///
    /// Cache failures and undecodable payloads are logged and reported as a
    /// miss.
    fn read_cache<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_read_cache(key) {
            Ok(Some(value)) => {
                tracing::debug!("cache hit for {key}");
                Some(value)
            }
            Ok(None) => {
                tracing::debug!("cache miss for {key}");
                None
            }
            Err(error) => {
                tracing::warn!("could not read {key} from the cache: {error}");
                None
            }
        }
    }

    fn try_read_cache<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        let Some(bytes) = self.cache.get(key)? else {
            return Ok(None);
        };

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Encode and store a value for the configured TTL, logging any failure.
    fn write_cache<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(error) = self.try_write_cache(key, value) {
            tracing::warn!("could not write {key} to the cache: {error}");
        }
    }

    fn try_write_cache<T: Serialize>(&self, key: &str, value: &T) -> Result<(), Error> {
        let bytes = serde_json::to_vec(value)?;

        self.cache.set(key, bytes, self.config.cache_ttl)
    }

    fn invalidate_cache(&self, key: &str) {
        if let Err(error) = self.cache.delete(key) {
            tracing::warn!("could not invalidate {key} in the cache: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use time::macros::date;

    use crate::{
        Budget, Error, Ledger, LedgerConfig, SpendScope,
        cache::{Cache, MemoryCache},
        cancellation::Cancellation,
        ledger::BUDGETS_CACHE_KEY,
        stores::BudgetStore,
        test_utils::{
            FailingCache, SlowBudgetStore, get_test_ledger, get_test_stores, ledger_with,
        },
        transaction::Transaction,
    };

    #[tokio::test]
    async fn set_budget_rejects_invalid_budget() {
        let ledger = get_test_ledger(LedgerConfig::default());

        let result = ledger
            .set_budget(Budget {
                category: "Food".to_owned(),
                limit: -1.0,
            })
            .await;

        assert_eq!(
            result,
            Err(Error::InvalidBudget("limit must be positive".to_owned()))
        );
    }

    #[tokio::test]
    async fn get_budget_for_unknown_category() {
        let ledger = get_test_ledger(LedgerConfig::default());

        let result = ledger.get_budget("Food").await;

        assert_eq!(result, Err(Error::NoBudgetCategory));
    }

    #[tokio::test]
    async fn set_budget_then_get_budget() {
        let ledger = get_test_ledger(LedgerConfig::default());
        let budget = Budget::new("Food", 120.0).unwrap();

        ledger.set_budget(budget.clone()).await.unwrap();

        assert_eq!(ledger.get_budget("Food").await, Ok(budget));
    }

    #[tokio::test]
    async fn list_budgets_reflects_upsert_after_being_cached() {
        let cache = Arc::new(MemoryCache::new());
        let ledger = ledger_with(cache.clone(), LedgerConfig::default());
        ledger
            .set_budget(Budget::new("Food", 100.0).unwrap())
            .await
            .unwrap();

        let first = ledger.list_budgets().await.unwrap();
        assert!(cache.get(BUDGETS_CACHE_KEY).unwrap().is_some());

        ledger
            .set_budget(Budget::new("Food", 200.0).unwrap())
            .await
            .unwrap();
        let second = ledger.list_budgets().await.unwrap();

        assert_eq!(first["Food"].limit, 100.0);
        assert_eq!(second["Food"].limit, 200.0);
    }

    #[tokio::test]
    async fn list_budgets_works_without_a_cache() {
        let ledger = ledger_with(Arc::new(FailingCache), LedgerConfig::default());
        ledger
            .set_budget(Budget::new("Rent", 900.0).unwrap())
            .await
            .unwrap();

        let budgets = ledger.list_budgets().await.unwrap();

        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets["Rent"], Budget::new("Rent", 900.0).unwrap());
    }

    #[tokio::test]
    async fn list_budgets_ignores_unparseable_cache_entry() {
        let cache = Arc::new(MemoryCache::new());
        let ledger = ledger_with(cache.clone(), LedgerConfig::default());
        ledger
            .set_budget(Budget::new("Rent", 900.0).unwrap())
            .await
            .unwrap();
        cache
            .set(BUDGETS_CACHE_KEY, b"not json".to_vec(), Duration::from_secs(30))
            .unwrap();

        let budgets = ledger.list_budgets().await.unwrap();

        assert_eq!(budgets.len(), 1);
    }

    #[tokio::test]
    async fn add_transaction_commits_within_budget() {
        let ledger = get_test_ledger(LedgerConfig::default());
        ledger
            .set_budget(Budget::new("Food", 1000.0).unwrap())
            .await
            .unwrap();
        ledger
            .add_transaction(Transaction::build(700.0, "Food", date!(2025 - 01 - 01)))
            .await
            .unwrap();

        let accepted = ledger
            .add_transaction(Transaction::build(300.0, "Food", date!(2025 - 01 - 02)))
            .await;
        let rejected = ledger
            .add_transaction(Transaction::build(0.01, "Food", date!(2025 - 01 - 03)))
            .await;

        let accepted = accepted.expect("Could not add transaction");
        assert_eq!(ledger.get_transaction(accepted.id).await, Ok(accepted));
        assert_eq!(rejected, Err(Error::BudgetExceeded));
        assert_eq!(ledger.list_transactions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn add_transaction_reports_invalid_transaction() {
        let ledger = get_test_ledger(LedgerConfig::default());

        let result = ledger
            .add_transaction(Transaction::build(-1.0, "Food", date!(2025 - 01 - 01)))
            .await;

        assert_eq!(result, Err(Error::InvalidTransaction));
    }

    #[tokio::test]
    async fn get_transaction_with_invalid_id_returns_not_found() {
        let ledger = get_test_ledger(LedgerConfig::default());

        assert_eq!(ledger.get_transaction(99).await, Err(Error::NotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn budget_set_while_listing_is_not_hidden_by_the_cache() {
        let (budgets, transactions) = get_test_stores();
        budgets.upsert(&Budget::new("Food", 100.0).unwrap()).unwrap();
        let budgets = SlowBudgetStore {
            inner: budgets,
            get_all_delay: Duration::from_millis(200),
        };
        let ledger = Ledger::new(
            Arc::new(budgets),
            Arc::new(transactions),
            Arc::new(MemoryCache::new()),
            LedgerConfig::default(),
        );

        let listing = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.list_budgets().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        ledger
            .set_budget(Budget::new("Food", 200.0).unwrap())
            .await
            .unwrap();
        let during = listing.await.unwrap().unwrap();
        let after = ledger.list_budgets().await.unwrap();

        assert_eq!(during["Food"].limit, 100.0);
        assert_eq!(after["Food"].limit, 200.0);
    }

    /// Spend 90 of a 100 budget in January, then try to spend 50 in February
    /// through both the single and bulk paths.
    async fn february_results(spend_scope: SpendScope) -> (Result<(), Error>, Option<String>) {
        let ledger = get_test_ledger(LedgerConfig {
            spend_scope,
            ..LedgerConfig::default()
        });
        ledger
            .set_budget(Budget::new("Food", 100.0).unwrap())
            .await
            .unwrap();
        ledger
            .add_transaction(Transaction::build(90.0, "Food", date!(2025 - 01 - 20)))
            .await
            .unwrap();

        let single = ledger
            .add_transaction(Transaction::build(50.0, "Food", date!(2025 - 02 - 03)))
            .await
            .map(|_| ());
        let bulk = ledger
            .bulk_add(
                vec![Transaction::build(50.0, "Food", date!(2025 - 02 - 04))],
                2,
                Cancellation::never(),
            )
            .await
            .unwrap();

        (single, bulk.errors.get(&0).cloned())
    }

    #[tokio::test]
    async fn month_scope_applies_to_single_and_bulk_adds() {
        let (single, bulk_error) = february_results(SpendScope::Month).await;

        assert_eq!(single, Ok(()));
        assert_eq!(bulk_error, None);
    }

    #[tokio::test]
    async fn lifetime_scope_applies_to_single_and_bulk_adds() {
        let (single, bulk_error) = february_results(SpendScope::Lifetime).await;

        assert_eq!(single, Err(Error::BudgetExceeded));
        assert_eq!(bulk_error, Some("budget exceeded".to_owned()));
    }
}
