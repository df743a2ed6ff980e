//! Single-slot persistence for the tracked job mapping.
//!
//! The tracker serializes the whole `id -> Job` mapping into one JSON string
//! and hands it to a [`JobStore`]. Stores only move that string around, which
//! keeps them trivial to substitute in tests.

use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Default slot name for the job mapping.
pub const DEFAULT_SLOT: &str = "transcricoes";

/// Backing storage for the serialized job mapping.
pub trait JobStore: Send {
    /// Read the slot; `None` when nothing was stored yet.
    ///
    /// # Errors
    /// Returns an error when the backing medium cannot be read.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Overwrite the slot.
    ///
    /// # Errors
    /// Returns an error when the write is rejected (quota, io).
    fn save(&mut self, raw: &str) -> Result<(), StoreError>;

    /// Drop the slot entirely.
    ///
    /// # Errors
    /// Returns an error when the slot cannot be removed.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// In-memory slot with an optional byte quota.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    slot: Option<String>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Empty store without a quota.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with raw slot contents.
    #[must_use]
    pub fn with_contents(raw: impl Into<String>) -> Self {
        Self {
            slot: Some(raw.into()),
            quota: None,
        }
    }

    /// Reject writes larger than `bytes`.
    #[must_use]
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Current raw slot contents.
    #[must_use]
    pub fn contents(&self) -> Option<&str> {
        self.slot.as_deref()
    }
}

impl JobStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slot.clone())
    }

    fn save(&mut self, raw: &str) -> Result<(), StoreError> {
        if let Some(limit) = self.quota
            && raw.len() > limit
        {
            return Err(StoreError::QuotaExceeded {
                needed: raw.len(),
                limit,
            });
        }
        self.slot = Some(raw.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.slot = None;
        Ok(())
    }
}

/// Slot stored as one JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store backed by `path`. The file is created lazily on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/<slot>.json`.
    pub fn in_dir(dir: impl AsRef<Path>, slot: &str) -> Self {
        Self::new(dir.as_ref().join(format!("{slot}.json")))
    }

    /// Location of the slot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl JobStore for FileStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn save(&mut self, raw: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        std::fs::write(&temp, raw)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
