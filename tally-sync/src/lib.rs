//! Persistent ledger store with windowed, single-flight institution sync.

pub mod contracts;
pub mod error;
pub mod file;
pub mod store;
pub mod sync;
pub mod window;

pub use contracts::{downloader_fn, DownloadFn, Downloaded, Downloader, TransactionMutator};
pub use error::{DownloadErrors, SyncError, SyncResult, WindowError};
pub use file::{FsLedgerFile, LedgerFile};
pub use store::Store;
pub use sync::sync_ledger;
pub use window::{sync_windows, SyncSettings};
