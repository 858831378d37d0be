//! The pre-store local archive of saved contracts, read only for migration.

use std::path::{Path, PathBuf};

use clausebook_core::SavedContract;
use tracing::warn;

use crate::StoreError;

/// Source of legacy saved contracts.
pub trait LegacyArchive: Send + Sync {
    /// Every archived contract. Failing to enumerate is an error; a single
    /// unreadable entry is skipped.
    fn list(&self) -> Result<Vec<SavedContract>, StoreError>;
}

/// A directory of `*.json` files, one [`SavedContract`] each.
pub struct DirArchive {
    dir: PathBuf,
}

impl DirArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl LegacyArchive for DirArchive {
    fn list(&self) -> Result<Vec<SavedContract>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut contracts = Vec::with_capacity(paths.len());
        for path in paths {
            let parsed = std::fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|body| serde_json::from_str::<SavedContract>(&body).map_err(Into::into));
            match parsed {
                Ok(contract) => contracts.push(contract),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable archive entry"),
            }
        }
        Ok(contracts)
    }
}

/// Fixed archive contents, for tests and imports.
#[derive(Default)]
pub struct MemoryArchive {
    contracts: Vec<SavedContract>,
}

impl MemoryArchive {
    pub fn new(contracts: Vec<SavedContract>) -> Self {
        Self { contracts }
    }
}

impl LegacyArchive for MemoryArchive {
    fn list(&self) -> Result<Vec<SavedContract>, StoreError> {
        Ok(self.contracts.clone())
    }
}
