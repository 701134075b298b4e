use chrono::NaiveDate;
use parking_lot::RwLock;
use tally_ledger::Ledger;
use tracing::{info, warn};

use crate::contracts::{Downloaded, Downloader, TransactionMutator};
use crate::error::{DownloadErrors, SyncError, SyncResult};
use crate::window::{sync_windows, SyncSettings};

/// Download, filter, rewrite and merge transactions between `start` and `end` into `ledger`.
///
/// Every window is attempted even after a failure, and transactions fetched by a failing window
/// are kept. A partially applied merge is returned ahead of download failures; any other ledger
/// failure aborts the run. Persisting the ledger is left to the caller.
pub async fn sync_ledger(
    ledger: &RwLock<Ledger>,
    start: NaiveDate,
    end: NaiveDate,
    settings: &SyncSettings,
    downloader: &dyn Downloader,
    mutator: &dyn TransactionMutator,
) -> SyncResult<()> {
    ledger.read().validate().map_err(SyncError::InvalidLedger)?;

    let mut downloaded = Vec::new();
    let mut errors = DownloadErrors::default();
    for (window_start, window_end) in sync_windows(start, end, settings) {
        info!(start = %window_start, end = %window_end, "downloading transactions");
        let Downloaded {
            transactions,
            error,
        } = downloader.download(window_start, window_end).await;
        downloaded.extend(transactions);
        if let Some(err) = error {
            errors.push(window_start, window_end, err);
        }
    }
    if errors.is_empty() {
        info!(count = downloaded.len(), "download succeeded");
    } else {
        warn!(failed = errors.len(), error = %errors, "failed to download some transactions");
    }

    // institutions may return history from before the requested range
    downloaded.retain(|txn| txn.date >= start);
    mutator.mutate(&mut downloaded);

    let merged = ledger.write().add_transactions(downloaded);
    if let Err(err) = merged {
        warn!(error = %err, "failed to add transactions to ledger");
        return Err(SyncError::from(err));
    }
    info!("ledger successfully updated");
    errors.into_result().map_err(SyncError::Download)
}
