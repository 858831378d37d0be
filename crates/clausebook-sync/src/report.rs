//! Best-effort clause persistence shared by finalize, migration, and import.

use clausebook_core::Clause;
use clausebook_store::ClauseStore;
use tracing::warn;

/// Outcome of saving a batch of clauses one by one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub saved: usize,
    pub failed: usize,
    /// Canonical keys of the clauses that failed to save.
    pub failed_keys: Vec<String>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub fn absorb(&mut self, other: SaveReport) {
        self.saved += other.saved;
        self.failed += other.failed;
        self.failed_keys.extend(other.failed_keys);
    }
}

/// Save every clause in order. A failed save is logged and counted and the
/// loop moves on.
pub async fn save_all(store: &dyn ClauseStore, contract_id: &str, clauses: &[Clause]) -> SaveReport {
    let mut report = SaveReport::default();
    for clause in clauses {
        match store.save_clause(contract_id, clause).await {
            Ok(()) => report.saved += 1,
            Err(e) => {
                let key = clause.key();
                warn!(contract = contract_id, key = %key, error = %e, "clause save failed");
                report.failed += 1;
                report.failed_keys.push(key);
            }
        }
    }
    report
}
