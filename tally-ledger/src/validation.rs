use std::collections::HashMap;

use rust_decimal::Decimal;
use tally_core::Transaction;

use crate::error::{LedgerError, LedgerResult, ValidationFailure};

/// Check every balance assertion against the running balance of its account.
///
/// When the first transaction carries an opening-balance posting it seeds the running balances
/// and is only checked structurally. Otherwise each account starts at whatever balance makes its
/// first posting consistent. The returned index is the position within `transactions`.
pub(crate) fn validate_transactions(transactions: &[Transaction]) -> LedgerResult<()> {
    let Some(first) = transactions.first() else {
        return Ok(());
    };

    let mut balances: HashMap<&str, Decimal> = HashMap::new();
    let mut previous: HashMap<&str, usize> = HashMap::new();
    let mut found_opening = false;
    for posting in &first.postings {
        if posting.is_equity() {
            // custom equity lines do not seed anything
            found_opening |= posting.is_opening_balance();
        } else {
            balances.insert(&posting.account, posting.value());
        }
    }

    let skip = if found_opening {
        first
            .validate()
            .map_err(|err| LedgerError::validation(0, err))?;
        for posting in &first.postings {
            previous.insert(&posting.account, 0);
        }
        1
    } else {
        balances.clear();
        for posting in transactions.iter().flat_map(|txn| &txn.postings) {
            balances
                .entry(&posting.account)
                .or_insert_with(|| posting.balance.unwrap_or(Decimal::ZERO) - posting.value());
        }
        0
    };

    for (index, txn) in transactions.iter().enumerate().skip(skip) {
        txn.validate()
            .map_err(|err| LedgerError::validation(index, err))?;
        for posting in &txn.postings {
            let account = posting.account.as_str();
            if let Some(asserted) = posting.balance {
                let Some(running) = balances.get(account).copied() else {
                    return Err(LedgerError::validation(
                        index,
                        ValidationFailure::NoOpeningBalance {
                            account: account.to_string(),
                            transaction: txn.to_string(),
                        },
                    ));
                };
                let implied = asserted - posting.value();
                if running != implied {
                    return Err(LedgerError::validation(
                        index,
                        ValidationFailure::BalanceMismatch {
                            account: account.to_string(),
                            difference: running - implied,
                            previous: previous
                                .get(account)
                                .map(|ix| transactions[*ix].to_string())
                                .unwrap_or_default(),
                            current: txn.to_string(),
                            auto_generated: !found_opening,
                        },
                    ));
                }
                balances.insert(account, asserted);
            } else {
                *balances.entry(account).or_default() += posting.value();
            }
            previous.insert(account, index);
        }
    }
    Ok(())
}
