#![allow(missing_docs)]

use std::{
    ops::RangeInclusive,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rusqlite::Connection;
use time::Date;

use crate::{
    Budget, Error, Ledger, LedgerConfig,
    cache::{Cache, MemoryCache},
    database_id::TransactionId,
    db::initialize,
    stores::{
        BudgetStore, TransactionStore,
        sqlite::{SQLiteBudgetStore, SQLiteTransactionStore},
    },
    transaction::{Transaction, TransactionBuilder},
};

/// Budget and transaction stores sharing one initialized in-memory database.
pub(crate) fn get_test_stores() -> (SQLiteBudgetStore, SQLiteTransactionStore) {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    initialize(&connection).expect("Could not initialize database.");
    let connection = Arc::new(Mutex::new(connection));

    (
        SQLiteBudgetStore::new(connection.clone()),
        SQLiteTransactionStore::new(connection),
    )
}

pub(crate) fn get_test_ledger(config: LedgerConfig) -> Ledger {
    ledger_with(Arc::new(MemoryCache::new()), config)
}

/// A ledger over fresh in-memory stores that uses `cache`.
pub(crate) fn ledger_with(cache: Arc<dyn Cache>, config: LedgerConfig) -> Ledger {
    let (budgets, transactions) = get_test_stores();

    Ledger::new(Arc::new(budgets), Arc::new(transactions), cache, config)
}

/// A budget store whose every call fails with [Error::DatabaseLockError].
pub(crate) struct FailingBudgetStore;

impl BudgetStore for FailingBudgetStore {
    fn get(&self, _category: &str) -> Result<Budget, Error> {
        Err(Error::DatabaseLockError)
    }

    fn upsert(&self, _budget: &Budget) -> Result<(), Error> {
        Err(Error::DatabaseLockError)
    }

    fn get_all(&self) -> Result<Vec<Budget>, Error> {
        Err(Error::DatabaseLockError)
    }
}

/// Wraps a SQLite budget store and holds on to the budget list for a while
/// after reading it, so the returned list can go stale.
pub(crate) struct SlowBudgetStore {
    pub inner: SQLiteBudgetStore,
    pub get_all_delay: Duration,
}

impl BudgetStore for SlowBudgetStore {
    fn get(&self, category: &str) -> Result<Budget, Error> {
        self.inner.get(category)
    }

    fn upsert(&self, budget: &Budget) -> Result<(), Error> {
        self.inner.upsert(budget)
    }

    fn get_all(&self) -> Result<Vec<Budget>, Error> {
        let budgets = self.inner.get_all()?;
        std::thread::sleep(self.get_all_delay);

        Ok(budgets)
    }
}

/// A cache whose every call fails.
pub(crate) struct FailingCache;

impl Cache for FailingCache {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, Error> {
        Err(Error::CacheError("cache unavailable".to_owned()))
    }

    fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), Error> {
        Err(Error::CacheError("cache unavailable".to_owned()))
    }

    fn delete(&self, _key: &str) -> Result<(), Error> {
        Err(Error::CacheError("cache unavailable".to_owned()))
    }
}

/// Wraps a SQLite transaction store with injectable delays and failures and
/// counts the calls that reach it.
pub(crate) struct TestTransactionStore {
    pub inner: SQLiteTransactionStore,
    /// Sleep this long before every `sum_by_category` call.
    pub sum_delay: Duration,
    /// Fail `sum_by_category` for this category with [Error::DatabaseLockError].
    pub failing_sum_category: Option<String>,
    /// Fail `distinct_categories` with [Error::DatabaseLockError].
    pub fail_distinct: bool,
    /// Panic when creating a transaction in this category.
    pub panicking_create_category: Option<String>,
    pub calls: AtomicUsize,
}

impl TestTransactionStore {
    pub fn new(inner: SQLiteTransactionStore) -> Self {
        Self {
            inner,
            sum_delay: Duration::ZERO,
            failing_sum_category: None,
            fail_distinct: false,
            panicking_create_category: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn count_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl TransactionStore for TestTransactionStore {
    fn create(&self, builder: TransactionBuilder) -> Result<Transaction, Error> {
        self.count_call();

        if self.panicking_create_category.as_ref() == Some(&builder.category) {
            panic!("create failed for {}", builder.category);
        }

        self.inner.create(builder)
    }

    fn get(&self, id: TransactionId) -> Result<Transaction, Error> {
        self.count_call();
        self.inner.get(id)
    }

    fn get_all(&self) -> Result<Vec<Transaction>, Error> {
        self.count_call();
        self.inner.get_all()
    }

    fn sum_by_category(
        &self,
        category: &str,
        date_range: Option<RangeInclusive<Date>>,
    ) -> Result<f64, Error> {
        self.count_call();

        if !self.sum_delay.is_zero() {
            std::thread::sleep(self.sum_delay);
        }

        if self.failing_sum_category.as_deref() == Some(category) {
            return Err(Error::DatabaseLockError);
        }

        self.inner.sum_by_category(category, date_range)
    }

    fn distinct_categories(&self, date_range: RangeInclusive<Date>) -> Result<Vec<String>, Error> {
        self.count_call();

        if self.fail_distinct {
            return Err(Error::DatabaseLockError);
        }

        self.inner.distinct_categories(date_range)
    }
}
