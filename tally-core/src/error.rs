use rust_decimal::Decimal;
use thiserror::Error;

/// Result alias for text parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Structural problems with a single transaction.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transactions must have a minimum of 2 postings, found {0}")]
    TooFewPostings(usize),
    #[error("posting for account '{0}' has no amount")]
    MissingAmount(String),
    #[error("only one posting may omit its amount, found {0}")]
    AmbiguousAmount(usize),
    #[error("transaction is not balanced - postings sum to {0}")]
    Unbalanced(Decimal),
}

/// Failure while reading the ledger text format, tied to a 1-based line.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("invalid date '{0}', expected YYYY/MM/DD")]
    InvalidDate(String),
    #[error("transaction is missing a payee")]
    MissingPayee,
    #[error("an account name must be specified: '{0}'")]
    MissingAccount(String),
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("invalid balance '{0}'")]
    InvalidBalance(String),
    #[error("posting outside of a transaction: '{0}'")]
    OrphanPosting(String),
    #[error("{0}")]
    Transaction(#[from] TransactionError),
    #[error("failed to read ledger: {0}")]
    Io(String),
}
