use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_core::{parse_transactions, sort_by_date, AccountTrie, Transaction, ACCOUNT_SEPARATOR};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::ids::{collect_ids, make_id_set};
use crate::query::{paginate_from_end, search_score, QueryOptions, QueryResult};
use crate::report::{account_balance, balance_history, left_over_balances, BalanceHistory};
use crate::validation::validate_transactions;

/// Ordered collection of transactions plus the index of every transaction and posting ID.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    transactions: Vec<Transaction>,
    id_index: HashSet<String>,
}

impl Ledger {
    /// Build a ledger, inferring elided amounts and rejecting duplicate IDs.
    ///
    /// Transactions that cannot be balanced are kept as given; [`Ledger::validate`] reports them.
    pub fn new(mut transactions: Vec<Transaction>) -> LedgerResult<Self> {
        balance_all(&mut transactions);
        let scan = make_id_set(transactions);
        if !scan.duplicates.is_empty() {
            return Err(LedgerError::DuplicateIds(scan.duplicates));
        }
        Ok(Self {
            transactions: scan.unique,
            id_index: scan.ids,
        })
    }

    pub fn from_reader<R: BufRead>(reader: R) -> LedgerResult<Self> {
        Self::new(parse_transactions(reader)?)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.id_index.contains(id)
    }

    pub fn first_transaction_date(&self) -> Option<NaiveDate> {
        self.transactions.first().map(|txn| txn.date)
    }

    pub fn last_transaction_date(&self) -> Option<NaiveDate> {
        self.transactions.last().map(|txn| txn.date)
    }

    /// Look up a transaction by its own ID or the ID of one of its postings.
    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.position(id).map(|ix| &self.transactions[ix])
    }

    fn position(&self, id: &str) -> Option<usize> {
        if id.is_empty() || !self.id_index.contains(id) {
            return None;
        }
        self.transactions
            .iter()
            .position(|txn| txn.ids().any(|txn_id| txn_id == id))
    }

    pub fn opening_balances(&self) -> Option<&Transaction> {
        self.transactions.iter().find(|txn| txn.is_opening_balance())
    }

    /// Check every balance assertion; see [`LedgerError::Validation`].
    pub fn validate(&self) -> LedgerResult<()> {
        validate_transactions(&self.transactions)
    }

    /// Merge `incoming` into the ledger.
    ///
    /// Transactions whose IDs are already known are dropped, the union is re-sorted by date and
    /// validated. When validation fails on a newly added transaction the valid prefix is kept
    /// and [`LedgerError::PartialApply`] is returned; any other failure leaves the ledger as is.
    pub fn add_transactions(&mut self, mut incoming: Vec<Transaction>) -> LedgerResult<()> {
        balance_all(&mut incoming);
        let existing = self.transactions.len();
        let offered = incoming.len();
        let scan = make_id_set(self.transactions.iter().cloned().chain(incoming));
        let ids = scan.ids;

        // existing transactions are unique, so they occupy the first `existing` slots;
        // anything else means the id index was corrupted by an earlier mutation
        let mut tagged: Vec<(usize, Transaction)> = scan.unique.into_iter().enumerate().collect();
        tagged.sort_by_key(|(_, txn)| txn.date);
        let (origins, mut candidate): (Vec<usize>, Vec<Transaction>) = tagged.into_iter().unzip();
        let added = candidate.len().checked_sub(existing).ok_or_else(|| {
            LedgerError::InvalidState(format!(
                "{} of {existing} existing transactions survived deduplication",
                candidate.len()
            ))
        })?;

        match validate_transactions(&candidate) {
            Ok(()) => {
                info!(added, skipped = offered - added, "merged transactions into ledger");
                self.transactions = candidate;
                self.id_index = ids;
                Ok(())
            }
            Err(LedgerError::Validation { index, cause })
                if origins[index..].iter().all(|origin| *origin >= existing) =>
            {
                candidate.truncate(index);
                let applied = index.saturating_sub(existing);
                warn!(
                    applied,
                    dropped = added - applied,
                    index,
                    "partially applied new transactions"
                );
                self.id_index = collect_ids(&candidate);
                debug!(ids = self.id_index.len(), "rebuilt id index");
                self.transactions = candidate;
                Err(LedgerError::PartialApply {
                    applied,
                    index,
                    cause,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Replace the comment and postings of the transaction owning `id`.
    ///
    /// Empty fields in `update` keep the current values. The updated transaction must balance
    /// and must not introduce duplicate IDs. A ledger validation failure afterwards is returned
    /// but the update stays applied.
    pub fn update_transaction(&mut self, id: &str, update: Transaction) -> LedgerResult<()> {
        let ix = self
            .position(id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        let mut txn = self.transactions[ix].clone();
        if !update.comment.is_empty() {
            txn.comment = update.comment;
        }
        if !update.postings.is_empty() {
            txn.postings = update.postings;
        }
        txn.balance()?;

        let mut candidate = self.transactions.clone();
        candidate[ix] = txn;
        let scan = make_id_set(candidate);
        if !scan.duplicates.is_empty() {
            return Err(LedgerError::DuplicateIds(scan.duplicates));
        }
        self.transactions = scan.unique;
        self.id_index = scan.ids;
        debug!(id, "updated transaction");
        self.validate()
    }

    /// Replace every opening-balance transaction with `opening` and re-sort by date.
    pub fn update_opening_balance(&mut self, mut opening: Transaction) -> LedgerResult<()> {
        if !opening.postings.iter().any(|posting| posting.is_opening_balance()) {
            return Err(LedgerError::MissingOpeningBalance);
        }
        opening.balance()?;

        let mut candidate: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|txn| !txn.is_opening_balance())
            .cloned()
            .collect();
        candidate.push(opening);
        sort_by_date(&mut candidate);
        let scan = make_id_set(candidate);
        if !scan.duplicates.is_empty() {
            return Err(LedgerError::DuplicateIds(scan.duplicates));
        }
        self.transactions = scan.unique;
        self.id_index = scan.ids;
        info!(date = ?self.first_transaction_date(), "updated opening balance");
        Ok(())
    }

    /// Rename postings on exactly `old` to `new`, returning how many changed.
    ///
    /// With a non-empty `old_id`, renamed postings whose ID starts with it get that prefix
    /// swapped for `new_id`. A rewrite that collides with another ID fails with
    /// [`LedgerError::DuplicateIds`] and leaves the ledger unchanged.
    pub fn rename_account(
        &mut self,
        old: &str,
        new: &str,
        old_id: &str,
        new_id: &str,
    ) -> LedgerResult<usize> {
        let mut candidate = self.transactions.clone();
        let mut renamed = 0;
        for posting in candidate
            .iter_mut()
            .flat_map(|txn| txn.postings.iter_mut())
            .filter(|posting| posting.account == old)
        {
            posting.account = new.to_string();
            if !old_id.is_empty() {
                if let Some(rest) = posting.id().strip_prefix(old_id) {
                    let id = format!("{new_id}{rest}");
                    posting.set_id(id);
                }
            }
            renamed += 1;
        }
        if renamed == 0 {
            return Ok(0);
        }

        let scan = make_id_set(candidate);
        if !scan.duplicates.is_empty() {
            return Err(LedgerError::DuplicateIds(scan.duplicates));
        }
        self.transactions = scan.unique;
        self.id_index = scan.ids;
        info!(old, new, renamed, "renamed account");
        Ok(renamed)
    }

    /// Rename `old` and every account nested under it, returning how many postings changed.
    pub fn update_account(&mut self, old: &str, new: &str) -> LedgerResult<usize> {
        if old.is_empty() || new.is_empty() {
            return Err(LedgerError::InvalidAccount(
                "account names must not be empty".to_string(),
            ));
        }
        if new.ends_with(ACCOUNT_SEPARATOR) {
            return Err(LedgerError::InvalidAccount(new.to_string()));
        }
        let trie = AccountTrie::from_accounts([old]);
        let mut updated = 0;
        for posting in self
            .transactions
            .iter_mut()
            .flat_map(|txn| txn.postings.iter_mut())
        {
            if trie.covers(&posting.account) {
                posting.account = format!("{new}{}", &posting.account[old.len()..]);
                updated += 1;
            }
        }
        info!(old, new, updated, "updated account");
        Ok(updated)
    }

    /// Paginated search over every transaction except the opening balance.
    pub fn query(
        &self,
        options: &QueryOptions,
        page: usize,
        results: usize,
    ) -> LedgerResult<QueryResult> {
        if page == 0 || results == 0 {
            return Err(LedgerError::InvalidQuery(format!(
                "page and results must be at least 1, got page {page} results {results}"
            )));
        }

        let matches: Vec<&Transaction> = self
            .transactions
            .iter()
            .filter(|txn| !txn.is_opening_balance() && options.matches(txn))
            .collect();
        let matches = if options.search.trim().is_empty() {
            matches
        } else {
            let mut scored: Vec<(i64, &Transaction)> = matches
                .into_iter()
                .map(|txn| (search_score(txn, &options.search), txn))
                .filter(|(score, _)| *score >= 0)
                .collect();
            scored.sort_by_key(|(score, _)| *score);
            scored.into_iter().map(|(_, txn)| txn).collect()
        };

        let (start, end) = paginate_from_end(page, results, matches.len());
        Ok(QueryResult {
            count: matches.len(),
            page,
            results,
            transactions: matches[start..end].iter().map(|txn| (*txn).clone()).collect(),
        })
    }

    /// Write an unfiltered page of transactions as pretty JSON.
    pub fn write_json<W: Write>(&self, page: usize, results: usize, writer: W) -> LedgerResult<()> {
        let result = self.query(&QueryOptions::default(), page, results)?;
        serde_json::to_writer_pretty(writer, &result)?;
        Ok(())
    }

    /// Cumulative per-account balances over the ledger's date span.
    pub fn balances(&self) -> Option<BalanceHistory> {
        balance_history(&self.transactions)
    }

    /// Sum of postings on `account` and its nested accounts within the inclusive date range.
    pub fn account_balance(
        &self,
        account: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Decimal {
        account_balance(&self.transactions, account, start, end)
    }

    /// Per-account sums for accounts not nested under any of `excluded`.
    pub fn left_over_account_balances<S: AsRef<str>>(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        excluded: &[S],
    ) -> BTreeMap<String, Decimal> {
        left_over_balances(&self.transactions, start, end, excluded)
    }
}

// unbalanced transactions are left for validation to reject at their sorted position
fn balance_all(transactions: &mut [Transaction]) {
    for txn in transactions {
        if let Err(err) = txn.balance() {
            debug!(payee = %txn.payee, %err, "transaction does not balance");
        }
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for txn in &self.transactions {
            writeln!(f, "{txn}")?;
        }
        Ok(())
    }
}

impl FromStr for Ledger {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_reader(s.as_bytes())
    }
}
