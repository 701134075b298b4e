//! Core domain types for Tally ledgers: postings, transactions, the plain-text format and the
//! account prefix trie.

mod account;
mod error;
mod parser;
mod posting;
mod tags;
mod transaction;

pub use account::{account_segments, is_nested_under, AccountTrie, ACCOUNT_SEPARATOR};
pub use error::{ParseError, ParseErrorKind, ParseResult, TransactionError};
pub use parser::{parse_str, parse_transactions};
pub use posting::{
    parse_amount, Posting, DEFAULT_CURRENCY, OPENING_BALANCE_ACCOUNT, OPENING_BALANCE_ID,
};
pub use tags::{parse_tags, serialize_comment, Tags, ID_TAG};
pub use transaction::{sort_by_date, Transaction, DATE_FORMAT};
