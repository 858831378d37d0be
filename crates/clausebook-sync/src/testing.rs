//! Store wrappers for exercising failure paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use clausebook_core::{Clause, ContractSummary};
use clausebook_store::{
    AuthHandle, ClauseSnapshot, ClauseStore, Identity, MemoryStore, StoreError, Subscription,
};

pub fn admin() -> Identity {
    Identity {
        uid: "u-admin".into(),
        email: "admin@example.com".into(),
    }
}

pub fn signed_in_store() -> MemoryStore {
    MemoryStore::new(AuthHandle::signed_in(admin()))
}

/// Delegates to a [`MemoryStore`], failing selected calls.
pub struct FlakyStore {
    inner: MemoryStore,
    failing_keys: HashSet<String>,
    fail_create: bool,
    fail_loads: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing_keys: HashSet::new(),
            fail_create: false,
            fail_loads: AtomicBool::new(false),
        }
    }

    pub fn fail_key(mut self, key: &str) -> Self {
        self.failing_keys.insert(key.to_string());
        self
    }

    pub fn fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl ClauseStore for FlakyStore {
    async fn load_contracts(&self) -> Result<Vec<ContractSummary>, StoreError> {
        self.inner.load_contracts().await
    }

    async fn get_contract(&self, contract_id: &str) -> Result<ContractSummary, StoreError> {
        self.inner.get_contract(contract_id).await
    }

    async fn create_contract(&self, contract_id: &str, title: &str) -> Result<(), StoreError> {
        if self.fail_create {
            return Err(StoreError::Backend("permission denied".into()));
        }
        self.inner.create_contract(contract_id, title).await
    }

    async fn load_snapshot(&self, contract_id: &str) -> Result<ClauseSnapshot, StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("unavailable".into()));
        }
        self.inner.load_snapshot(contract_id).await
    }

    async fn save_clause(&self, contract_id: &str, clause: &Clause) -> Result<(), StoreError> {
        if self.failing_keys.contains(&clause.key()) {
            return Err(StoreError::Backend(format!("write rejected for {}", clause.key())));
        }
        self.inner.save_clause(contract_id, clause).await
    }

    async fn delete_clause(&self, contract_id: &str, clause_key: &str) -> Result<(), StoreError> {
        self.inner.delete_clause(contract_id, clause_key).await
    }

    fn subscribe_clauses(&self, contract_id: &str) -> Result<Subscription, StoreError> {
        self.inner.subscribe_clauses(contract_id)
    }
}
