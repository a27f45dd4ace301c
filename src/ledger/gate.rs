//! The budget gate: decides whether a single transaction may be committed.

use crate::{
    Error, SpendScope,
    stores::{BudgetStore, TransactionStore},
    transaction::TransactionBuilder,
};

/// Check `transaction` against its category's budget.
///
/// Returns `Ok(())` to accept the transaction. The check is a pure decision,
/// the caller is responsible for committing an accepted transaction.
///
/// # Errors
/// Rejects the transaction with:
/// - [Error::InvalidTransaction] if the amount is not positive or the category is empty,
/// - [Error::NoBudgetCategory] if the category has no budget,
/// - [Error::BudgetExceeded] if the amount already spent in `scope` plus the
///   transaction's amount is over the limit,
/// - or the store's own error if a lookup fails.
pub fn admit(
    transaction: &TransactionBuilder,
    scope: SpendScope,
    budgets: &dyn BudgetStore,
    transactions: &dyn TransactionStore,
) -> Result<(), Error> {
    transaction.validate()?;

    let budget = budgets
        .get(&transaction.category)
        .map_err(|error| match error {
            Error::NotFound => Error::NoBudgetCategory,
            error => error,
        })?;

    let date_range = scope.date_range(transaction.date)?;
    let spent = transactions.sum_by_category(&transaction.category, date_range)?;

    if spent + transaction.amount > budget.limit {
        return Err(Error::BudgetExceeded);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        Budget, Error, SpendScope,
        stores::{BudgetStore, TransactionStore},
        test_utils::{FailingBudgetStore, get_test_stores},
        transaction::Transaction,
    };

    use super::admit;

    #[test]
    fn accepts_up_to_and_including_the_limit() {
        let (budgets, transactions) = get_test_stores();
        budgets.upsert(&Budget::new("Food", 1000.0).unwrap()).unwrap();
        transactions
            .create(Transaction::build(700.0, "Food", date!(2025 - 01 - 01)))
            .unwrap();

        let exact = Transaction::build(300.0, "Food", date!(2025 - 01 - 02));
        let over = Transaction::build(301.0, "Food", date!(2025 - 01 - 02));

        assert_eq!(
            admit(&exact, SpendScope::Lifetime, &budgets, &transactions),
            Ok(())
        );
        assert_eq!(
            admit(&over, SpendScope::Lifetime, &budgets, &transactions),
            Err(Error::BudgetExceeded)
        );
    }

    #[test]
    fn rejects_invalid_transaction_before_budget_lookup() {
        let transactions = get_test_stores().1;
        let candidate = Transaction::build(0.0, "Food", date!(2025 - 01 - 01));

        let result = admit(
            &candidate,
            SpendScope::Lifetime,
            &FailingBudgetStore,
            &transactions,
        );

        assert_eq!(result, Err(Error::InvalidTransaction));
    }

    #[test]
    fn rejects_category_without_budget() {
        let (budgets, transactions) = get_test_stores();
        let candidate = Transaction::build(10.0, "Unknown", date!(2025 - 01 - 01));

        let result = admit(&candidate, SpendScope::Lifetime, &budgets, &transactions);

        assert_eq!(result, Err(Error::NoBudgetCategory));
    }

    #[test]
    fn surfaces_other_budget_lookup_errors() {
        let transactions = get_test_stores().1;
        let candidate = Transaction::build(10.0, "Food", date!(2025 - 01 - 01));

        let result = admit(
            &candidate,
            SpendScope::Lifetime,
            &FailingBudgetStore,
            &transactions,
        );

        assert_eq!(result, Err(Error::DatabaseLockError));
    }

    #[test]
    fn month_scope_ignores_other_months() {
        let (budgets, transactions) = get_test_stores();
        budgets.upsert(&Budget::new("Food", 100.0).unwrap()).unwrap();
        transactions
            .create(Transaction::build(90.0, "Food", date!(2025 - 01 - 31)))
            .unwrap();
        let candidate = Transaction::build(50.0, "Food", date!(2025 - 02 - 01));

        assert_eq!(
            admit(&candidate, SpendScope::Month, &budgets, &transactions),
            Ok(())
        );
        assert_eq!(
            admit(&candidate, SpendScope::Lifetime, &budgets, &transactions),
            Err(Error::BudgetExceeded)
        );
    }
}
