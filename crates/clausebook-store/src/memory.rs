//! In-process document store.
//!
//! Mirrors the remote document layout (`users`, `contracts/{id}/meta`,
//! `contracts/{id}/clauses/{key}`) with clause documents held as JSON so that
//! merge-on-save and the versioned decode step behave exactly as they would
//! against a remote backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use clausebook_core::{
    Clause, ContractMeta, ContractSummary, Role, UserProfile, decode_clause, encode_clause,
    iso_timestamp, sort_clauses,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::adapter::{ClauseSnapshot, ClauseStore, ProfileStore, merge_document};
use crate::auth::AuthHandle;
use crate::subscribe::{Subscribers, Subscription};
use crate::StoreError;

#[derive(Default)]
struct ContractDoc {
    meta: Option<ContractMeta>,
    clauses: BTreeMap<String, Value>,
    revision: u64,
}

#[derive(Default)]
struct Documents {
    contracts: HashMap<String, ContractDoc>,
    users: BTreeMap<String, UserProfile>,
}

pub struct MemoryStore {
    auth: AuthHandle,
    docs: Mutex<Documents>,
    subscribers: Subscribers,
}

impl MemoryStore {
    pub fn new(auth: AuthHandle) -> Self {
        Self {
            auth,
            docs: Mutex::new(Documents::default()),
            subscribers: Subscribers::default(),
        }
    }

    pub fn auth(&self) -> &AuthHandle {
        &self.auth
    }

    /// Number of open clause feeds for a contract.
    pub fn subscriber_count(&self, contract_id: &str) -> usize {
        self.subscribers.count(contract_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Documents> {
        self.docs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot_of(doc: Option<&ContractDoc>) -> Result<ClauseSnapshot, StoreError> {
        let Some(doc) = doc else {
            return Ok(ClauseSnapshot::default());
        };
        let mut clauses = doc
            .clauses
            .iter()
            .map(|(key, value)| decode_clause(value.clone(), Some(key)))
            .collect::<Result<Vec<Clause>, _>>()?;
        sort_clauses(&mut clauses);
        Ok(ClauseSnapshot {
            revision: doc.revision,
            clauses,
        })
    }
}

#[async_trait]
impl ClauseStore for MemoryStore {
    async fn load_contracts(&self) -> Result<Vec<ContractSummary>, StoreError> {
        self.auth.require()?;
        let docs = self.lock();
        let mut list: Vec<ContractSummary> = docs
            .contracts
            .iter()
            .filter_map(|(id, doc)| {
                doc.meta.as_ref().map(|meta| ContractSummary {
                    id: id.clone(),
                    meta: meta.clone(),
                })
            })
            .collect();
        list.sort_by(|a, b| b.meta.created_at.cmp(&a.meta.created_at));
        Ok(list)
    }

    async fn get_contract(&self, contract_id: &str) -> Result<ContractSummary, StoreError> {
        self.auth.require()?;
        let docs = self.lock();
        docs.contracts
            .get(contract_id)
            .and_then(|doc| doc.meta.clone())
            .map(|meta| ContractSummary {
                id: contract_id.to_string(),
                meta,
            })
            .ok_or_else(|| StoreError::NotFound(format!("contract {contract_id}")))
    }

    async fn create_contract(&self, contract_id: &str, title: &str) -> Result<(), StoreError> {
        let identity = self.auth.require()?;
        let mut docs = self.lock();
        let doc = docs.contracts.entry(contract_id.to_string()).or_default();
        if doc.meta.is_some() {
            return Err(StoreError::AlreadyExists(format!("contract {contract_id}")));
        }
        doc.meta = Some(ContractMeta::new(title, identity.email, Utc::now()));
        info!(contract = contract_id, title, "created contract");
        Ok(())
    }

    async fn load_snapshot(&self, contract_id: &str) -> Result<ClauseSnapshot, StoreError> {
        self.auth.require()?;
        let docs = self.lock();
        Self::snapshot_of(docs.contracts.get(contract_id))
    }

    async fn save_clause(&self, contract_id: &str, clause: &Clause) -> Result<(), StoreError> {
        self.auth.require()?;
        let key = clause.key();
        let encoded = encode_clause(clause)?;
        let snapshot = {
            let mut docs = self.lock();
            let doc = docs.contracts.entry(contract_id.to_string()).or_default();
            match doc.clauses.get_mut(&key) {
                Some(existing) => merge_document(existing, encoded),
                None => {
                    doc.clauses.insert(key.clone(), encoded);
                }
            }
            doc.revision += 1;
            Self::snapshot_of(Some(&*doc))?
        };
        debug!(contract = contract_id, key = %key, revision = snapshot.revision, "saved clause");
        self.subscribers.publish(contract_id, &snapshot);
        Ok(())
    }

    async fn delete_clause(&self, contract_id: &str, clause_key: &str) -> Result<(), StoreError> {
        self.auth.require()?;
        let snapshot = {
            let mut docs = self.lock();
            let doc = docs
                .contracts
                .get_mut(contract_id)
                .filter(|doc| doc.clauses.contains_key(clause_key))
                .ok_or_else(|| {
                    StoreError::NotFound(format!("clause {clause_key} in {contract_id}"))
                })?;
            doc.clauses.remove(clause_key);
            doc.revision += 1;
            Self::snapshot_of(Some(&*doc))?
        };
        info!(contract = contract_id, key = clause_key, "deleted clause");
        self.subscribers.publish(contract_id, &snapshot);
        Ok(())
    }

    fn subscribe_clauses(&self, contract_id: &str) -> Result<Subscription, StoreError> {
        self.auth.require()?;
        // Registered under the document lock: any write not in `initial`
        // publishes after this feed exists.
        let docs = self.lock();
        let initial = Self::snapshot_of(docs.contracts.get(contract_id))?;
        Ok(self.subscribers.add(contract_id, initial))
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
        self.auth.require()?;
        Ok(self.lock().users.get(uid).cloned())
    }

    async fn create_profile(&self, uid: &str, email: &str) -> Result<UserProfile, StoreError> {
        self.auth.require()?;
        let mut docs = self.lock();
        if docs.users.contains_key(uid) {
            return Err(StoreError::AlreadyExists(format!("profile {uid}")));
        }
        let profile = UserProfile {
            email: email.to_string(),
            role: Role::for_new_account(docs.users.len()),
            created_at: iso_timestamp(Utc::now()),
        };
        docs.users.insert(uid.to_string(), profile.clone());
        info!(email, role = profile.role.as_str(), "created user profile");
        Ok(profile)
    }

    async fn set_role(&self, uid: &str, role: Role) -> Result<UserProfile, StoreError> {
        self.auth.require()?;
        let mut docs = self.lock();
        let profile = docs
            .users
            .get_mut(uid)
            .ok_or_else(|| StoreError::NotFound(format!("profile {uid}")))?;
        profile.role = role;
        Ok(profile.clone())
    }

    async fn list_profiles(&self) -> Result<Vec<(String, UserProfile)>, StoreError> {
        self.auth.require()?;
        Ok(self
            .lock()
            .users
            .iter()
            .map(|(uid, p)| (uid.clone(), p.clone()))
            .collect())
    }
}
