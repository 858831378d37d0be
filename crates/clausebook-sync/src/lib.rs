//! Reconciliation engine: finalize extracted batches into the store, migrate
//! the legacy archive, arbitrate between the initial load and live pushes,
//! and gate everything on the signed-in user's role.

pub mod backup;
mod error;
pub mod finalize;
pub mod live;
pub mod migrate;
mod report;
pub mod session;
pub mod view;

#[cfg(test)]
mod testing;

pub use backup::{ImportOutcome, export_contract, import_backup};
pub use error::SyncError;
pub use finalize::{FinalizeOutcome, finalize};
pub use live::ContractSession;
pub use migrate::{
    MigrationProgress, MigrationReport, legacy_contract_id, migrate_archive, migrate_contract,
    migrate_if_needed,
};
pub use report::{SaveReport, save_all};
pub use session::{ActiveUser, SessionController};
pub use view::{ClauseView, Phase, Ticket};
