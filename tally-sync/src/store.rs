use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tally_core::Transaction;
use tally_ledger::{Ledger, LedgerError};
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::contracts::{Downloader, TransactionMutator};
use crate::error::{SyncError, SyncResult};
use crate::file::LedgerFile;
use crate::sync::sync_ledger;
use crate::window::SyncSettings;

/// A ledger kept in memory and mirrored to its backing file.
///
/// At most one sync runs at a time; starting another while one is in flight does nothing.
pub struct Store {
    ledger: RwLock<Ledger>,
    file: Arc<dyn LedgerFile>,
    settings: SyncSettings,
    syncing: AtomicBool,
    last_error: Mutex<Option<Arc<SyncError>>>,
}

impl Store {
    pub fn new(file: Arc<dyn LedgerFile>) -> SyncResult<Self> {
        Self::with_settings(file, SyncSettings::default())
    }

    /// Load the ledger from `file`; unreadable or unparsable contents fail construction.
    pub fn with_settings(file: Arc<dyn LedgerFile>, settings: SyncSettings) -> SyncResult<Self> {
        let bytes = file.read().map_err(SyncError::Read)?;
        let ledger = Ledger::from_reader(bytes.as_slice()).map_err(SyncError::Load)?;
        info!(transactions = ledger.len(), "loaded ledger");
        Ok(Self {
            ledger: RwLock::new(ledger),
            file,
            settings,
            syncing: AtomicBool::new(false),
            last_error: Mutex::new(None),
        })
    }

    /// Read access for queries and reports.
    pub fn ledger(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Whether a sync is running, and the error of the most recent finished sync.
    pub fn sync_status(&self) -> (bool, Option<Arc<SyncError>>) {
        let last_error = self.last_error.lock().clone();
        (self.syncing.load(Ordering::Acquire), last_error)
    }

    /// Sync `start..=end` in the background. Returns `None` when a sync is already running.
    ///
    /// A panic inside the downloader or mutator ends the run with [`SyncError::Aborted`].
    pub fn start_sync(
        self: &Arc<Self>,
        start: NaiveDate,
        end: NaiveDate,
        downloader: Arc<dyn Downloader>,
        mutator: Arc<dyn TransactionMutator>,
    ) -> Option<JoinHandle<()>> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("sync already running");
            return None;
        }
        info!(%start, %end, "starting sync");
        let store = Arc::clone(self);
        Some(tokio::spawn(async move {
            let run = Arc::clone(&store);
            let outcome = tokio::spawn(async move {
                run.sync(start, end, downloader.as_ref(), mutator.as_ref())
                    .await
            })
            .await;
            let err = match outcome {
                Ok(result) => result.err(),
                Err(join) => Some(SyncError::Aborted(join.to_string())),
            };
            store.finish_sync(err);
        }))
    }

    /// Sync from the last transaction date, or the recent lookback on an empty ledger, to today.
    pub fn sync_recent(
        self: &Arc<Self>,
        downloader: Arc<dyn Downloader>,
        mutator: Arc<dyn TransactionMutator>,
    ) -> Option<JoinHandle<()>> {
        let today = current_date();
        let start = self.ledger().last_transaction_date().unwrap_or_else(|| {
            today - Duration::days(i64::from(self.settings.recent_days))
        });
        self.start_sync(start, today, downloader, mutator)
    }

    /// Sync everything from the first transaction date to today.
    pub fn resync(
        self: &Arc<Self>,
        downloader: Arc<dyn Downloader>,
        mutator: Arc<dyn TransactionMutator>,
    ) -> Option<JoinHandle<()>> {
        let today = current_date();
        let start = self.ledger().first_transaction_date().unwrap_or(today);
        self.start_sync(start, today, downloader, mutator)
    }

    async fn sync(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        downloader: &dyn Downloader,
        mutator: &dyn TransactionMutator,
    ) -> SyncResult<()> {
        let outcome = sync_ledger(
            &self.ledger,
            start,
            end,
            &self.settings,
            downloader,
            mutator,
        )
        .await;
        if let Err(err) = &outcome {
            if !err.is_soft() {
                return outcome;
            }
        }

        let contents = self.ledger.read().to_string();
        let file = Arc::clone(&self.file);
        task::spawn_blocking(move || file.write(contents.as_bytes()))
            .await
            .map_err(|err| SyncError::Write(std::io::Error::other(err)))?
            .map_err(SyncError::Write)?;
        outcome
    }

    fn finish_sync(&self, err: Option<SyncError>) {
        match &err {
            Some(err) => error!(error = %err, soft = err.is_soft(), "error syncing"),
            None => info!("sync finished"),
        }
        *self.last_error.lock() = err.map(Arc::new);
        self.syncing.store(false, Ordering::Release);
    }

    fn persist(&self) -> SyncResult<()> {
        let contents = self.ledger.read().to_string();
        self.file
            .write(contents.as_bytes())
            .map_err(SyncError::Write)
    }

    /// Merge transactions and persist. A partial apply is still written and then returned.
    pub fn add_transactions(&self, transactions: Vec<Transaction>) -> SyncResult<()> {
        let merged = self.ledger.write().add_transactions(transactions);
        match merged {
            Ok(()) => self.persist(),
            Err(err) if err.is_partial_apply() => {
                self.persist()?;
                Err(SyncError::PartialApply(err))
            }
            Err(err) => Err(SyncError::Ledger(err)),
        }
    }

    /// Update one transaction and persist. Validation failures leave the update applied, so
    /// they are returned after the write.
    pub fn update_transaction(&self, id: &str, transaction: Transaction) -> SyncResult<()> {
        let updated = self.ledger.write().update_transaction(id, transaction);
        match updated {
            Ok(()) => self.persist(),
            Err(err) if err.is_validation() => {
                self.persist()?;
                Err(SyncError::Ledger(err))
            }
            Err(err) => Err(SyncError::Ledger(err)),
        }
    }

    /// Apply a batch of updates keyed by ID.
    ///
    /// Any non-validation failure is returned without writing. Validation failures are returned
    /// after the file is written.
    pub fn update_transactions<I>(&self, updates: I) -> SyncResult<()>
    where
        I: IntoIterator<Item = (String, Transaction)>,
    {
        let mut failures: Vec<LedgerError> = Vec::new();
        let mut invalid: Vec<LedgerError> = Vec::new();
        {
            let mut ledger = self.ledger.write();
            for (id, transaction) in updates {
                match ledger.update_transaction(&id, transaction) {
                    Ok(()) => {}
                    Err(err) if err.is_validation() => invalid.push(err),
                    Err(err) => {
                        warn!(%id, error = %err, "failed to update transaction");
                        failures.push(err);
                    }
                }
            }
        }

        if let Some(err) = failures.into_iter().next() {
            return Err(SyncError::Ledger(err));
        }
        self.persist()?;
        match invalid.pop() {
            Some(err) => Err(SyncError::Ledger(err)),
            None => Ok(()),
        }
    }

    pub fn update_opening_balance(&self, opening: Transaction) -> SyncResult<()> {
        self.ledger.write().update_opening_balance(opening)?;
        self.persist()
    }

    /// Rename postings on `old`, returning how many changed once the file is written.
    /// A rename that would duplicate an ID is rejected without writing.
    pub fn rename_account(
        &self,
        old: &str,
        new: &str,
        old_id: &str,
        new_id: &str,
    ) -> SyncResult<usize> {
        let renamed = self
            .ledger
            .write()
            .rename_account(old, new, old_id, new_id)?;
        self.persist()?;
        Ok(renamed)
    }

    /// Rename `old` and its nested accounts, returning how many postings changed.
    pub fn update_account(&self, old: &str, new: &str) -> SyncResult<usize> {
        let updated = self.ledger.write().update_account(old, new)?;
        self.persist()?;
        Ok(updated)
    }
}

fn current_date() -> NaiveDate {
    Utc::now().date_naive()
}
