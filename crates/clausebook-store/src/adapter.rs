//! The persistence boundary for contracts, clauses, and user profiles.

use async_trait::async_trait;
use clausebook_core::{Clause, ContractSummary, Role, UserProfile};

use crate::StoreError;
use crate::subscribe::Subscription;

/// A contract's full clause list at one store revision.
///
/// Revisions increase by one on every clause write or delete within the
/// contract, so a larger revision is always the newer snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClauseSnapshot {
    pub revision: u64,
    /// Always in canonical order.
    pub clauses: Vec<Clause>,
}

/// Contract and clause persistence.
///
/// Every method requires a signed-in identity and fails with
/// [`StoreError::Unauthenticated`] otherwise.
#[async_trait]
pub trait ClauseStore: Send + Sync {
    /// All contracts, newest first.
    async fn load_contracts(&self) -> Result<Vec<ContractSummary>, StoreError>;

    /// A single contract's metadata.
    async fn get_contract(&self, contract_id: &str) -> Result<ContractSummary, StoreError>;

    /// Create contract metadata owned by the current identity.
    ///
    /// An existing contract is left untouched and reported as
    /// [`StoreError::AlreadyExists`].
    async fn create_contract(&self, contract_id: &str, title: &str) -> Result<(), StoreError>;

    /// The current clause list with its revision.
    async fn load_snapshot(&self, contract_id: &str) -> Result<ClauseSnapshot, StoreError>;

    /// The current clause list in canonical order.
    async fn load_clauses(&self, contract_id: &str) -> Result<Vec<Clause>, StoreError> {
        Ok(self.load_snapshot(contract_id).await?.clauses)
    }

    /// Upsert by canonical clause key, merging fields into any existing document.
    async fn save_clause(&self, contract_id: &str, clause: &Clause) -> Result<(), StoreError>;

    async fn delete_clause(&self, contract_id: &str, clause_key: &str) -> Result<(), StoreError>;

    /// Live feed of full clause snapshots for one contract.
    ///
    /// The current snapshot is delivered first, then one snapshot per change.
    /// Dropping the [`Subscription`] unsubscribes.
    fn subscribe_clauses(&self, contract_id: &str) -> Result<Subscription, StoreError>;
}

/// The `users` collection.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Create a profile for `uid`. The first profile ever created is an admin,
    /// every later one starts out pending. Fails if the profile exists.
    async fn create_profile(&self, uid: &str, email: &str) -> Result<UserProfile, StoreError>;

    async fn set_role(&self, uid: &str, role: Role) -> Result<UserProfile, StoreError>;

    /// Every `(uid, profile)` pair.
    async fn list_profiles(&self) -> Result<Vec<(String, UserProfile)>, StoreError>;
}

/// Shallow field merge of a new clause document into an existing one.
///
/// Fields present in `update` win; fields only in `existing` survive.
pub(crate) fn merge_document(existing: &mut serde_json::Value, update: serde_json::Value) {
    match (existing, update) {
        (serde_json::Value::Object(current), serde_json::Value::Object(incoming)) => {
            for (field, value) in incoming {
                current.insert(field, value);
            }
        }
        (slot, update) => *slot = update,
    }
}
