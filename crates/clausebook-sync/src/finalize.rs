//! Turn a freshly extracted clause batch into a stored contract.

use chrono::{DateTime, Utc};
use clausebook_core::{
    Clause, ContractSummary, annotate_clause, derive_contract_id,
    detect_contract_name, sort_clauses,
};
use clausebook_store::{ClauseSnapshot, ClauseStore};
use tracing::info;

use crate::SyncError;
use crate::report::{SaveReport, save_all};

/// What a finalize run left in the store.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub contract_id: String,
    pub name: String,
    pub report: SaveReport,
    /// The contract's clauses as read back from the store.
    pub snapshot: ClauseSnapshot,
    /// Every contract, newest first, as read back from the store.
    pub contracts: Vec<ContractSummary>,
}

/// Annotate, order, name, and persist an extracted batch, then reload from
/// the store.
///
/// Clause save failures are counted in the report. Failing to create the
/// contract (other than it already existing) or to reload aborts.
pub async fn finalize(
    store: &dyn ClauseStore,
    mut clauses: Vec<Clause>,
    now: DateTime<Utc>,
) -> Result<FinalizeOutcome, SyncError> {
    if clauses.is_empty() {
        return Err(SyncError::NoClauses);
    }

    for clause in &mut clauses {
        annotate_clause(clause);
        clause.refresh_derived();
    }
    sort_clauses(&mut clauses);

    let name = detect_contract_name(&clauses, now);
    let contract_id = derive_contract_id(&name, now);
    ensure_contract(store, &contract_id, &name).await?;

    let report = save_all(store, &contract_id, &clauses).await;
    info!(
        contract = %contract_id,
        saved = report.saved,
        failed = report.failed,
        "finalized analysis"
    );

    let snapshot = store.load_snapshot(&contract_id).await?;
    let contracts = store.load_contracts().await?;
    Ok(FinalizeOutcome {
        contract_id,
        name,
        report,
        snapshot,
        contracts,
    })
}

/// Create contract metadata unless it is already there.
pub(crate) async fn ensure_contract(
    store: &dyn ClauseStore,
    contract_id: &str,
    title: &str,
) -> Result<(), SyncError> {
    match store.create_contract(contract_id, title).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_already_exists() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlakyStore, signed_in_store};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn overlapping_chunks_merge_by_key() {
        let store = signed_in_store();
        let mut batch = vec![
            Clause::new("2", "Employer", "first pass"),
            Clause::new("10", "Claims", ""),
            Clause::new("1", "General Provisions", "See Clause 2.1 for details."),
        ];
        // Second chunk repeats clause 2 with more text.
        batch.push(Clause::new("2", "Employer", "second pass"));
        batch.push(Clause::new("2.1", "Access", ""));

        let outcome = finalize(&store, batch, now()).await.unwrap();
        assert_eq!(outcome.name, "General Provisions");
        assert_eq!(outcome.contract_id, "GeneralProvisions");
        assert_eq!(outcome.report.saved, 5);

        let numbers: Vec<&str> = outcome
            .snapshot
            .clauses
            .iter()
            .map(|c| c.clause_number.as_str())
            .collect();
        assert_eq!(numbers, vec!["1", "2", "2.1", "10"]);
        assert_eq!(outcome.snapshot.clauses[1].clause_text, "second pass");
        assert!(
            outcome.snapshot.clauses[0]
                .clause_text
                .contains("href=\"#clause-2.1\"")
        );
        assert_eq!(outcome.contracts.len(), 1);
    }

    #[tokio::test]
    async fn untitled_batch_gets_dated_name() {
        let store = signed_in_store();
        let outcome = finalize(&store, vec![Clause::new("1", "Untitled", "")], now())
            .await
            .unwrap();
        assert_eq!(outcome.name, "Analysis 2026-03-01");
        assert_eq!(outcome.contract_id, "Analysis20260301");
    }

    #[tokio::test]
    async fn refinalizing_tolerates_existing_contract() {
        let store = signed_in_store();
        let batch = vec![Clause::new("1", "Red Book", "")];
        finalize(&store, batch.clone(), now()).await.unwrap();
        let again = finalize(&store, batch, now()).await.unwrap();
        assert_eq!(again.snapshot.clauses.len(), 1);
    }

    #[tokio::test]
    async fn failed_saves_are_counted_not_fatal() {
        let store = FlakyStore::new(signed_in_store()).fail_key("C.2");
        let batch = vec![
            Clause::new("1", "Red Book", ""),
            Clause::new("2", "", ""),
            Clause::new("3", "", ""),
        ];
        let outcome = finalize(&store, batch, now()).await.unwrap();
        assert_eq!(outcome.report.saved, 2);
        assert_eq!(outcome.report.failed_keys, vec!["C.2"]);
        assert_eq!(outcome.snapshot.clauses.len(), 2);
    }

    #[tokio::test]
    async fn contract_creation_failure_aborts() {
        let store = FlakyStore::new(signed_in_store()).fail_create();
        let err = finalize(&store, vec![Clause::new("1", "Red Book", "")], now())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(_)));
    }

    #[tokio::test]
    async fn empty_batch_rejected() {
        let store = signed_in_store();
        assert!(matches!(
            finalize(&store, Vec::new(), now()).await,
            Err(SyncError::NoClauses)
        ));
    }
}
