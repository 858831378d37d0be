//! Device-local migration progress, kept outside the clause store.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Progress of the one-time legacy archive migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    #[default]
    Pending,
    /// A run started and never finished; treated like `Pending`.
    InProgress,
    Complete,
}

impl MigrationState {
    pub fn needs_run(self) -> bool {
        self != Self::Complete
    }
}

pub trait FlagStore: Send + Sync {
    fn load(&self) -> Result<MigrationState, StoreError>;
    fn store(&self, state: MigrationState) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DeviceState {
    #[serde(default)]
    legacy_migration: MigrationState,
}

/// JSON file under the device state directory. A missing file means `Pending`.
pub struct FileFlagStore {
    path: PathBuf,
}

impl FileFlagStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FlagStore for FileFlagStore {
    fn load(&self) -> Result<MigrationState, StoreError> {
        if !self.path.exists() {
            return Ok(MigrationState::Pending);
        }
        let state: DeviceState = serde_json::from_str(&std::fs::read_to_string(&self.path)?)?;
        Ok(state.legacy_migration)
    }

    fn store(&self, state: MigrationState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&DeviceState {
            legacy_migration: state,
        })?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFlagStore {
    state: Mutex<MigrationState>,
}

impl FlagStore for MemoryFlagStore {
    fn load(&self) -> Result<MigrationState, StoreError> {
        Ok(*self.state.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn store(&self, state: MigrationState) -> Result<(), StoreError> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_pending() {
        let tmp = tempfile::TempDir::new().unwrap();
        let flags = FileFlagStore::new(tmp.path().join("device.json"));
        assert_eq!(flags.load().unwrap(), MigrationState::Pending);
    }

    #[test]
    fn file_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("state").join("device.json");
        let flags = FileFlagStore::new(&path);
        flags.store(MigrationState::InProgress).unwrap();
        assert_eq!(flags.load().unwrap(), MigrationState::InProgress);
        flags.store(MigrationState::Complete).unwrap();
        assert_eq!(FileFlagStore::new(&path).load().unwrap(), MigrationState::Complete);
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"complete\""));
    }

    #[test]
    fn only_complete_skips_the_run() {
        assert!(MigrationState::Pending.needs_run());
        assert!(MigrationState::InProgress.needs_run());
        assert!(!MigrationState::Complete.needs_run());
    }
}
