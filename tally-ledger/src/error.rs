use rust_decimal::Decimal;
use tally_core::{ParseError, TransactionError};
use thiserror::Error;

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error type surfaced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("duplicate transaction IDs found: {}", .0.join(", "))]
    DuplicateIds(Vec<String>),
    #[error("transaction {index} failed validation: {cause}")]
    Validation {
        index: usize,
        cause: ValidationFailure,
    },
    #[error("applied {applied} new transactions, transaction {index} failed validation: {cause}")]
    PartialApply {
        applied: usize,
        index: usize,
        cause: ValidationFailure,
    },
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error("transaction not found by ID: {0}")]
    NotFound(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid account: {0}")]
    InvalidAccount(String),
    #[error("opening balance transaction must contain an opening balance posting")]
    MissingOpeningBalance,
    #[error("invalid ledger state: {0}")]
    InvalidState(String),
    #[error("storage error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    pub(crate) fn validation(index: usize, cause: impl Into<ValidationFailure>) -> Self {
        Self::Validation {
            index,
            cause: cause.into(),
        }
    }

    /// Index of the first failing transaction for validation failures.
    pub fn validation_index(&self) -> Option<usize> {
        match self {
            Self::Validation { index, .. } | Self::PartialApply { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// True when a merge committed a valid prefix before failing.
    pub fn is_partial_apply(&self) -> bool {
        matches!(self, Self::PartialApply { .. })
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

/// Why a transaction failed ledger validation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(
        "balance assertion found for account '{account}', but no opening balance detected:\n{transaction}"
    )]
    NoOpeningBalance { account: String, transaction: String },
    #[error(
        "failed balance assertion for account '{account}'{}: difference = {difference}\nTransaction 1:\n{previous}\nTransaction 2:\n{current}",
        auto_generated_note(.auto_generated)
    )]
    BalanceMismatch {
        account: String,
        difference: Decimal,
        previous: String,
        current: String,
        auto_generated: bool,
    },
}

fn auto_generated_note(auto_generated: &bool) -> &'static str {
    if *auto_generated {
        " (opening balances were auto-generated)"
    } else {
        ""
    }
}
