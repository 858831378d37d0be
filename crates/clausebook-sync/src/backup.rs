//! Backup files in and out of the store.

use chrono::{DateTime, Utc};
use clausebook_core::{
    SavedContract, backup_file_name, derive_contract_id, explicit_contract_id, export_backup,
    iso_timestamp, parse_backup,
};
use clausebook_store::{ClauseStore, StoreError};
use tracing::info;

use crate::SyncError;
use crate::finalize::ensure_contract;
use crate::report::{SaveReport, save_all};

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub contract_id: String,
    pub name: String,
    pub report: SaveReport,
}

/// Validate a backup file and write its clauses into the store.
///
/// Validation failures abort before anything is written. Individual clause
/// failures are counted in the report.
pub async fn import_backup(
    store: &dyn ClauseStore,
    json: &str,
    now: DateTime<Utc>,
) -> Result<ImportOutcome, SyncError> {
    let contract = parse_backup(json)?;
    let contract_id = explicit_contract_id(contract.id.as_deref())
        .unwrap_or_else(|| derive_contract_id(&contract.name, now));

    ensure_contract(store, &contract_id, &contract.name).await?;
    let report = save_all(store, &contract_id, &contract.clauses).await;
    info!(
        contract = %contract_id,
        saved = report.saved,
        failed = report.failed,
        "imported backup"
    );
    Ok(ImportOutcome {
        contract_id,
        name: contract.name,
        report,
    })
}

/// A stored contract as `(file name, backup file body)`.
pub async fn export_contract(
    store: &dyn ClauseStore,
    contract_id: &str,
    now: DateTime<Utc>,
) -> Result<(String, String), SyncError> {
    let summary = store.get_contract(contract_id).await?;
    let clauses = store.load_clauses(contract_id).await?;
    let saved = SavedContract::new(
        Some(contract_id.to_string()),
        summary.meta.title,
        iso_timestamp(now),
        clauses,
    );
    let body = export_backup(&saved).map_err(StoreError::from)?;
    let file_name = backup_file_name(&saved.name, now);
    Ok((file_name, body))
}
