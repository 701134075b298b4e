use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_core::Transaction;

/// Filter describing which transactions a query returns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Free-text search, ignored when empty.
    pub search: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Keep transactions with a posting on any of these accounts.
    pub accounts: Vec<String>,
}

impl QueryOptions {
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_accounts<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accounts.extend(accounts.into_iter().map(Into::into));
        self
    }

    pub fn with_account(self, account: impl Into<String>) -> Self {
        self.with_accounts([account])
    }

    /// Date and account filters; search is applied separately.
    pub fn matches(&self, txn: &Transaction) -> bool {
        if self.start.is_some_and(|start| txn.date < start)
            || self.end.is_some_and(|end| txn.date > end)
        {
            return false;
        }
        self.accounts.is_empty()
            || txn
                .postings
                .iter()
                .any(|posting| self.accounts.contains(&posting.account))
    }
}

/// One page of query results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResult {
    /// Matches before pagination.
    pub count: usize,
    pub page: usize,
    pub results: usize,
    pub transactions: Vec<Transaction>,
}

/// Page bounds counted back from the end of `size` items, so page 1 holds the latest entries.
pub fn paginate_from_end(page: usize, results: usize, size: usize) -> (usize, usize) {
    let start = size.saturating_sub(page.saturating_mul(results));
    let end = size.saturating_sub(page.saturating_sub(1).saturating_mul(results));
    (start, end.min(size))
}

/// Relevance of `txn` for `search`, negative when it does not match at all.
///
/// Each whitespace separated term scores a point per field containing it (payee, comment, long
/// form date, every posting account). A transaction with no hits still matches with score 0 when
/// the search spells an initialism of the payee's words.
pub fn search_score(txn: &Transaction, search: &str) -> i64 {
    let search = search.to_lowercase();
    let payee = txn.payee.to_lowercase();
    let comment = txn.comment.to_lowercase();
    let date = txn.date.format("%A %-d %B %Y").to_string().to_lowercase();
    let accounts: Vec<String> = txn
        .postings
        .iter()
        .map(|posting| posting.account.to_lowercase())
        .collect();

    let mut score = 0;
    for term in search.split_whitespace() {
        let fields = [&payee, &comment, &date].into_iter().chain(accounts.iter());
        score += fields.filter(|field| field.contains(term)).count() as i64;
    }
    if score > 0 {
        return score;
    }
    if is_initialism(&payee, &search) {
        0
    } else {
        -1
    }
}

fn is_initialism(payee: &str, search: &str) -> bool {
    let mut wanted = search.chars().filter(|c| !c.is_whitespace()).peekable();
    if wanted.peek().is_none() {
        return false;
    }
    for word in payee.split_whitespace() {
        let Some(initial) = word.chars().next() else {
            continue;
        };
        if wanted.peek() == Some(&initial) {
            wanted.next();
            if wanted.peek().is_none() {
                return true;
            }
        }
    }
    false
}
