//! Durable storage seam for the credential store.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable blob storage backing a [`crate::store::CredentialStore`].
///
/// The store treats the vault as best-effort: a failing vault degrades the
/// store to in-memory operation, it never surfaces errors to callers.
pub trait CredentialVault: Send + Sync {
    /// Loads the persisted blob, or `None` when nothing was stored yet.
    ///
    /// # Errors
    /// Returns an I/O error if the underlying storage is unavailable.
    fn load(&self) -> io::Result<Option<Vec<u8>>>;

    /// Atomically replaces the persisted blob.
    ///
    /// # Errors
    /// Returns an I/O error if the underlying storage is unavailable.
    fn save(&self, bytes: &[u8]) -> io::Result<()>;
}

/// File-backed vault writing through a temporary file and rename.
#[derive(Debug)]
pub struct FileVault {
    path: PathBuf,
}

impl FileVault {
    /// Creates a vault persisting to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this vault persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialVault for FileVault {
    fn load(&self) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn save(&self, bytes: &[u8]) -> io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)
    }
}

/// In-memory vault, primarily for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryVault {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryVault {
    /// Creates an empty in-memory vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialVault for MemoryVault {
    fn load(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self
            .blob
            .lock()
            .map_err(|_| io::Error::other("vault mutex poisoned"))?
            .clone())
    }

    fn save(&self, bytes: &[u8]) -> io::Result<()> {
        *self
            .blob
            .lock()
            .map_err(|_| io::Error::other("vault mutex poisoned"))? = Some(bytes.to_vec());
        Ok(())
    }
}
