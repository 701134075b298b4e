use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tally_core::Transaction;

/// What a downloader fetched for one window.
///
/// A download may fail part way; whatever was fetched before the failure is still merged.
#[derive(Debug, Default)]
pub struct Downloaded {
    pub transactions: Vec<Transaction>,
    pub error: Option<anyhow::Error>,
}

impl Downloaded {
    pub fn complete(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            error: None,
        }
    }

    pub fn partial(transactions: Vec<Transaction>, error: anyhow::Error) -> Self {
        Self {
            transactions,
            error: Some(error),
        }
    }

    pub fn failed(error: anyhow::Error) -> Self {
        Self::partial(Vec::new(), error)
    }
}

impl From<Result<Vec<Transaction>>> for Downloaded {
    fn from(value: Result<Vec<Transaction>>) -> Self {
        match value {
            Ok(transactions) => Self::complete(transactions),
            Err(err) => Self::failed(err),
        }
    }
}

/// Source of raw institution transactions for a date window.
///
/// Implementations may return transactions slightly outside the window; the store filters them.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, start: NaiveDate, end: NaiveDate) -> Downloaded;
}

/// Adapter turning an async closure into a [`Downloader`] that fetches all or nothing.
pub struct DownloadFn<F>(F);

pub fn downloader_fn<F, Fut>(download: F) -> DownloadFn<F>
where
    F: Fn(NaiveDate, NaiveDate) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Transaction>>> + Send + 'static,
{
    DownloadFn(download)
}

#[async_trait]
impl<F, Fut> Downloader for DownloadFn<F>
where
    F: Fn(NaiveDate, NaiveDate) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Transaction>>> + Send + 'static,
{
    async fn download(&self, start: NaiveDate, end: NaiveDate) -> Downloaded {
        (self.0)(start, end).await.into()
    }
}

/// In-place rewrite of downloaded transactions, typically their account legs.
///
/// Must not reorder or drop transactions.
pub trait TransactionMutator: Send + Sync {
    fn mutate(&self, transactions: &mut [Transaction]);
}

impl<F> TransactionMutator for F
where
    F: Fn(&mut [Transaction]) + Send + Sync,
{
    fn mutate(&self, transactions: &mut [Transaction]) {
        self(transactions)
    }
}
