use std::fmt;
use std::io;

use chrono::NaiveDate;
use tally_ledger::LedgerError;
use thiserror::Error;

/// Result alias for store operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures surfaced by the store, ordered here from most to least severe for a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("error writing ledger to disk: {0}")]
    Write(#[source] io::Error),
    #[error("error reading ledger file: {0}")]
    Read(#[source] io::Error),
    #[error("error loading ledger: {0}")]
    Load(#[source] LedgerError),
    #[error("existing ledger is not valid: {0}")]
    InvalidLedger(#[source] LedgerError),
    #[error("sync did not finish: {0}")]
    Aborted(String),
    #[error(transparent)]
    Ledger(LedgerError),
    #[error(transparent)]
    PartialApply(LedgerError),
    #[error(transparent)]
    Download(#[from] DownloadErrors),
}

impl SyncError {
    /// Soft failures still leave the ledger updated and persisted.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::PartialApply(_) | Self::Download(_))
    }
}

impl From<LedgerError> for SyncError {
    fn from(value: LedgerError) -> Self {
        if value.is_partial_apply() {
            Self::PartialApply(value)
        } else {
            Self::Ledger(value)
        }
    }
}

/// A failed download for one sync window.
#[derive(Debug)]
pub struct WindowError {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub error: anyhow::Error,
}

/// Download failures collected across every window of a sync run.
#[derive(Debug, Default)]
pub struct DownloadErrors {
    errors: Vec<WindowError>,
}

impl DownloadErrors {
    pub fn push(&mut self, start: NaiveDate, end: NaiveDate, error: anyhow::Error) {
        self.errors.push(WindowError { start, end, error });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowError> {
        self.errors.iter()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for DownloadErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ix, window) in self.errors.iter().enumerate() {
            if ix > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "download {} to {}: {:#}",
                window.start, window.end, window.error
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for DownloadErrors {}
