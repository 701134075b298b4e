use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{is_nested_under, AccountTrie, Transaction};

/// Number of evenly spaced samples in a [`BalanceHistory`].
pub const BALANCE_BUCKETS: usize = 10;

/// Cumulative per-account balances sampled between the first and last transaction dates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BalanceHistory {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub balances: BTreeMap<String, Vec<Decimal>>,
}

pub(crate) fn balance_history(transactions: &[Transaction]) -> Option<BalanceHistory> {
    let start = transactions.iter().map(|txn| txn.date).min()?;
    let end = transactions.iter().map(|txn| txn.date).max()?;
    let span = (end - start).num_seconds();
    // the last bucket holds transactions on the end date
    let interval = span / (BALANCE_BUCKETS as i64 - 1);

    let mut balances: BTreeMap<String, Vec<Decimal>> = BTreeMap::new();
    for txn in transactions {
        let bucket = if interval == 0 {
            0
        } else {
            let offset = (txn.date - start).num_seconds() / interval;
            (offset as usize).min(BALANCE_BUCKETS - 1)
        };
        for posting in &txn.postings {
            let amounts = balances
                .entry(posting.account.clone())
                .or_insert_with(|| vec![Decimal::ZERO; BALANCE_BUCKETS]);
            amounts[bucket] += posting.value();
        }
    }

    for amounts in balances.values_mut() {
        for ix in 1..amounts.len() {
            let previous = amounts[ix - 1];
            amounts[ix] += previous;
        }
    }
    Some(BalanceHistory {
        start,
        end,
        balances,
    })
}

fn in_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.map_or(true, |start| date >= start) && end.map_or(true, |end| date <= end)
}

pub(crate) fn account_balance(
    transactions: &[Transaction],
    account: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Decimal {
    transactions
        .iter()
        .filter(|txn| in_range(txn.date, start, end))
        .flat_map(|txn| &txn.postings)
        .filter(|posting| is_nested_under(&posting.account, account))
        .map(|posting| posting.value())
        .sum()
}

pub(crate) fn left_over_balances<S: AsRef<str>>(
    transactions: &[Transaction],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    excluded: &[S],
) -> BTreeMap<String, Decimal> {
    let excluded = AccountTrie::from_accounts(excluded);
    let mut balances = BTreeMap::new();
    for posting in transactions
        .iter()
        .filter(|txn| in_range(txn.date, start, end))
        .flat_map(|txn| &txn.postings)
    {
        if !excluded.covers(&posting.account) {
            *balances
                .entry(posting.account.clone())
                .or_insert(Decimal::ZERO) += posting.value();
        }
    }
    balances
}
