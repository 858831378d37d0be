//! Moving the local legacy archive into the clause store.
//!
//! Bulk migration runs once per device: the persisted flag goes
//! `Pending -> InProgress -> Complete`. A run that dies half way leaves
//! `InProgress` behind and is retried next session. Lazy migration moves a
//! single contract on demand when the store has nothing for it.

use clausebook_core::{SavedContract, contract_id_from_name, explicit_contract_id};
use clausebook_store::{ClauseStore, FlagStore, LegacyArchive, MigrationState};
use tracing::{info, warn};

use crate::SyncError;
use crate::finalize::ensure_contract;
use crate::report::{SaveReport, save_all};

/// Advisory progress for a bulk run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationProgress {
    /// One-based position of the contract being migrated.
    pub index: usize,
    pub total: usize,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub contracts: usize,
    pub clauses: SaveReport,
}

/// Store id for an archived contract: its own id, else its name stripped to
/// alphanumerics, else a positional fallback.
pub fn legacy_contract_id(contract: &SavedContract, index: usize) -> String {
    explicit_contract_id(contract.id.as_deref())
        .or_else(|| contract_id_from_name(&contract.name))
        .unwrap_or_else(|| format!("legacy{index}"))
}

/// Migrate every archived contract.
///
/// Individual clause failures are counted and skipped. Any other failure
/// resets the flag to `Pending` and is returned. The flag is only set to
/// `Complete` after the whole archive has been walked.
pub async fn migrate_archive(
    store: &dyn ClauseStore,
    archive: &dyn LegacyArchive,
    flags: &dyn FlagStore,
    progress: &mut (dyn FnMut(MigrationProgress) + Send),
) -> Result<MigrationReport, SyncError> {
    flags.store(MigrationState::InProgress)?;
    match migrate_all(store, archive, progress).await {
        Ok(report) => {
            flags.store(MigrationState::Complete)?;
            info!(
                contracts = report.contracts,
                saved = report.clauses.saved,
                failed = report.clauses.failed,
                "legacy migration complete"
            );
            Ok(report)
        }
        Err(e) => {
            warn!(error = %e, "legacy migration aborted, will retry");
            flags.store(MigrationState::Pending)?;
            Err(e)
        }
    }
}

/// Run [`migrate_archive`] only if the flag says it has not finished yet.
pub async fn migrate_if_needed(
    store: &dyn ClauseStore,
    archive: &dyn LegacyArchive,
    flags: &dyn FlagStore,
    progress: &mut (dyn FnMut(MigrationProgress) + Send),
) -> Result<Option<MigrationReport>, SyncError> {
    let state = flags.load()?;
    if !state.needs_run() {
        return Ok(None);
    }
    if state == MigrationState::InProgress {
        info!("resuming interrupted legacy migration");
    }
    migrate_archive(store, archive, flags, progress).await.map(Some)
}

async fn migrate_all(
    store: &dyn ClauseStore,
    archive: &dyn LegacyArchive,
    progress: &mut (dyn FnMut(MigrationProgress) + Send),
) -> Result<MigrationReport, SyncError> {
    let contracts = archive.list().map_err(|e| SyncError::Archive(e.to_string()))?;
    let total = contracts.len();
    let mut report = MigrationReport::default();

    for (i, contract) in contracts.iter().enumerate() {
        progress(MigrationProgress {
            index: i + 1,
            total,
            name: contract.name.clone(),
        });
        let contract_id = legacy_contract_id(contract, i);
        ensure_contract(store, &contract_id, &contract.name).await?;
        let saved = save_all(store, &contract_id, &contract.clauses).await;
        info!(
            contract = %contract_id,
            saved = saved.saved,
            failed = saved.failed,
            "migrated legacy contract"
        );
        report.contracts += 1;
        report.clauses.absorb(saved);
    }
    Ok(report)
}

/// Migrate just the archived contract matching `contract_id`, if any.
///
/// Matches on the sanitized name, the raw name, or the archived id. Returns
/// `None` when nothing in the archive matches or the match has no clauses.
pub async fn migrate_contract(
    store: &dyn ClauseStore,
    archive: &dyn LegacyArchive,
    contract_id: &str,
) -> Result<Option<SaveReport>, SyncError> {
    let contracts = archive.list().map_err(|e| SyncError::Archive(e.to_string()))?;
    let Some(found) = contracts.into_iter().find(|c| {
        c.name == contract_id
            || c.id.as_deref() == Some(contract_id)
            || contract_id_from_name(&c.name).as_deref() == Some(contract_id)
    }) else {
        return Ok(None);
    };
    if found.clauses.is_empty() {
        return Ok(None);
    }

    ensure_contract(store, contract_id, &found.name).await?;
    let report = save_all(store, contract_id, &found.clauses).await;
    info!(
        contract = contract_id,
        saved = report.saved,
        failed = report.failed,
        "migrated legacy contract on demand"
    );
    Ok(Some(report))
}
