use std::collections::HashSet;

use tally_core::Transaction;

/// Outcome of scanning transactions for transaction and posting IDs.
#[derive(Debug, Default)]
pub struct IdScan {
    /// Every non-empty ID seen, duplicates included.
    pub ids: HashSet<String>,
    /// Transactions none of whose IDs were seen earlier in the scan.
    pub unique: Vec<Transaction>,
    /// Each repeated ID, once per repeat.
    pub duplicates: Vec<String>,
}

/// Scan `transactions` in order. A transaction carrying any previously seen ID is left out of
/// [`IdScan::unique`], but its IDs are still recorded so later repeats are flagged too.
pub fn make_id_set<I>(transactions: I) -> IdScan
where
    I: IntoIterator<Item = Transaction>,
{
    let mut scan = IdScan::default();
    for txn in transactions {
        let mut duplicate = false;
        for id in txn.ids() {
            if !scan.ids.insert(id.to_string()) {
                duplicate = true;
                scan.duplicates.push(id.to_string());
            }
        }
        if !duplicate {
            scan.unique.push(txn);
        }
    }
    scan
}

pub(crate) fn collect_ids(transactions: &[Transaction]) -> HashSet<String> {
    transactions
        .iter()
        .flat_map(Transaction::ids)
        .map(str::to_string)
        .collect()
}
