//! Ledger engine for Tally: balance-assertion validation, duplicate-aware merging, queries and
//! balance reports over plain-text transactions.

mod error;
mod ids;
mod ledger;
mod query;
mod report;
mod validation;

pub use error::{LedgerError, LedgerResult, ValidationFailure};
pub use ids::{make_id_set, IdScan};
pub use ledger::Ledger;
pub use query::{paginate_from_end, search_score, QueryOptions, QueryResult};
pub use report::{BalanceHistory, BALANCE_BUCKETS};
