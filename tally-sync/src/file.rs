use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Backing storage for a serialized ledger.
///
/// `write` must be atomic from the store's point of view: after a crash either the old or the
/// new contents are visible, never a mix.
pub trait LedgerFile: Send + Sync {
    fn read(&self) -> io::Result<Vec<u8>>;

    fn write(&self, bytes: &[u8]) -> io::Result<()>;
}

/// Ledger file on the local filesystem, replaced through a sibling temp file and a rename.
#[derive(Clone, Debug)]
pub struct FsLedgerFile {
    path: PathBuf,
}

impl FsLedgerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("ledger"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl LedgerFile for FsLedgerFile {
    fn read(&self) -> io::Result<Vec<u8>> {
        match fs::read(&self.path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            other => other,
        }
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let temp = self.temp_path();
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "wrote ledger file");
        Ok(())
    }
}
