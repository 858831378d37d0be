//! DuckDB-backed clause store.
//!
//! Clause documents are stored as JSON text keyed by `(contract_id, clause_key)`
//! and read back through Arrow batches, then passed through the same versioned
//! decode step as every other backend. Supports both in-memory (ephemeral)
//! and persistent (file-backed) modes.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use arrow::array::{Array, LargeStringArray, StringArray};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use clausebook_core::{
    Clause, ContractMeta, ContractSummary, Role, UserProfile, decode_clause, encode_clause,
    iso_timestamp, sort_clauses,
};
use duckdb::{Connection, params};
use tracing::{debug, info};

use crate::adapter::{ClauseSnapshot, ClauseStore, ProfileStore, merge_document};
use crate::auth::AuthHandle;
use crate::subscribe::{Subscribers, Subscription};
use crate::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contracts (
    id          VARCHAR PRIMARY KEY,
    title       VARCHAR NOT NULL,
    created_by  VARCHAR NOT NULL,
    created_at  VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS clauses (
    contract_id VARCHAR NOT NULL,
    clause_key  VARCHAR NOT NULL,
    document    VARCHAR NOT NULL,
    PRIMARY KEY (contract_id, clause_key)
);
CREATE TABLE IF NOT EXISTS revisions (
    contract_id VARCHAR PRIMARY KEY,
    revision    BIGINT NOT NULL
);
CREATE TABLE IF NOT EXISTS users (
    uid         VARCHAR PRIMARY KEY,
    email       VARCHAR NOT NULL,
    role        VARCHAR NOT NULL,
    created_at  VARCHAR NOT NULL
);";

pub struct DuckStore {
    auth: AuthHandle,
    conn: Mutex<Connection>,
    subscribers: Subscribers,
}

impl DuckStore {
    /// Open an in-memory store.
    pub fn open(auth: AuthHandle) -> Result<Self, StoreError> {
        Self::init(auth, Connection::open_in_memory()?)
    }

    /// Open or create a persistent store at the given path.
    pub fn open_persistent(auth: AuthHandle, path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(auth, Connection::open(path)?)
    }

    fn init(auth: AuthHandle, conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            auth,
            conn: Mutex::new(conn),
            subscribers: Subscribers::default(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn revision(conn: &Connection, contract_id: &str) -> Result<u64, StoreError> {
        let mut stmt = conn.prepare("SELECT revision FROM revisions WHERE contract_id = ?")?;
        let mut rows = stmt.query([contract_id])?;
        match rows.next()? {
            Some(row) => Ok(row.get::<_, i64>(0)?.max(0) as u64),
            None => Ok(0),
        }
    }

    fn bump_revision(conn: &Connection, contract_id: &str) -> Result<u64, StoreError> {
        let next = Self::revision(conn, contract_id)? + 1;
        let stored = i64::try_from(next).unwrap_or(i64::MAX);
        conn.execute(
            "INSERT OR REPLACE INTO revisions VALUES (?, ?)",
            params![contract_id, stored],
        )?;
        Ok(next)
    }

    fn snapshot(conn: &Connection, contract_id: &str) -> Result<ClauseSnapshot, StoreError> {
        let revision = Self::revision(conn, contract_id)?;
        let mut stmt =
            conn.prepare("SELECT clause_key, document FROM clauses WHERE contract_id = ?")?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([contract_id])?.collect();
        let mut clauses = decode_clause_batches(&batches)?;
        sort_clauses(&mut clauses);
        Ok(ClauseSnapshot { revision, clauses })
    }

    fn existing_document(
        conn: &Connection,
        contract_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let mut stmt = conn
            .prepare("SELECT document FROM clauses WHERE contract_id = ? AND clause_key = ?")?;
        let mut rows = stmt.query([contract_id, key])?;
        match rows.next()? {
            Some(row) => Ok(Some(serde_json::from_str(&row.get::<_, String>(0)?)?)),
            None => Ok(None),
        }
    }

    fn profile_count(conn: &Connection) -> Result<usize, StoreError> {
        let count: i64 = conn.query_row("SELECT count(*)::BIGINT FROM users", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    fn read_profile(conn: &Connection, uid: &str) -> Result<Option<UserProfile>, StoreError> {
        let mut stmt = conn.prepare("SELECT email, role, created_at FROM users WHERE uid = ?")?;
        let mut rows = stmt.query([uid])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(UserProfile {
            email: row.get(0)?,
            role: parse_role(&row.get::<_, String>(1)?)?,
            created_at: row.get(2)?,
        }))
    }
}

fn parse_role(s: &str) -> Result<Role, StoreError> {
    s.parse().map_err(StoreError::Backend)
}

/// Decode `(clause_key, document)` rows into clauses.
fn decode_clause_batches(batches: &[RecordBatch]) -> Result<Vec<Clause>, StoreError> {
    let mut clauses = Vec::new();
    for batch in batches {
        let keys = batch
            .column_by_name("clause_key")
            .ok_or_else(|| StoreError::Backend("missing 'clause_key' column".into()))?;
        let docs = batch
            .column_by_name("document")
            .ok_or_else(|| StoreError::Backend("missing 'document' column".into()))?;
        for row in 0..batch.num_rows() {
            let Some(body) = col_str(docs.as_ref(), row) else {
                continue;
            };
            let value: serde_json::Value = serde_json::from_str(body)?;
            clauses.push(decode_clause(value, col_str(keys.as_ref(), row))?);
        }
    }
    Ok(clauses)
}

/// Get a string value from a column that might be Utf8 or LargeUtf8.
fn col_str(col: &dyn Array, i: usize) -> Option<&str> {
    if col.is_null(i) {
        return None;
    }
    if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
        return Some(arr.value(i));
    }
    if let Some(arr) = col.as_any().downcast_ref::<LargeStringArray>() {
        return Some(arr.value(i));
    }
    None
}

#[async_trait]
impl ClauseStore for DuckStore {
    async fn load_contracts(&self) -> Result<Vec<ContractSummary>, StoreError> {
        self.auth.require()?;
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, title, created_by, created_at FROM contracts ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ContractSummary {
                id: row.get(0)?,
                meta: ContractMeta {
                    title: row.get(1)?,
                    created_by: row.get(2)?,
                    created_at: row.get(3)?,
                },
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn get_contract(&self, contract_id: &str) -> Result<ContractSummary, StoreError> {
        self.auth.require()?;
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT title, created_by, created_at FROM contracts WHERE id = ?")?;
        let mut rows = stmt.query([contract_id])?;
        let row = rows
            .next()?
            .ok_or_else(|| StoreError::NotFound(format!("contract {contract_id}")))?;
        Ok(ContractSummary {
            id: contract_id.to_string(),
            meta: ContractMeta {
                title: row.get(0)?,
                created_by: row.get(1)?,
                created_at: row.get(2)?,
            },
        })
    }

    async fn create_contract(&self, contract_id: &str, title: &str) -> Result<(), StoreError> {
        let identity = self.auth.require()?;
        let conn = self.lock();
        let exists: i64 = conn.query_row(
            "SELECT count(*)::BIGINT FROM contracts WHERE id = ?",
            [contract_id],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(StoreError::AlreadyExists(format!("contract {contract_id}")));
        }
        let meta = ContractMeta::new(title, identity.email, Utc::now());
        conn.execute(
            "INSERT INTO contracts VALUES (?, ?, ?, ?)",
            params![contract_id, meta.title, meta.created_by, meta.created_at],
        )?;
        info!(contract = contract_id, title, "created contract");
        Ok(())
    }

    async fn load_snapshot(&self, contract_id: &str) -> Result<ClauseSnapshot, StoreError> {
        self.auth.require()?;
        let conn = self.lock();
        Self::snapshot(&conn, contract_id)
    }

    async fn save_clause(&self, contract_id: &str, clause: &Clause) -> Result<(), StoreError> {
        self.auth.require()?;
        let key = clause.key();
        let encoded = encode_clause(clause)?;
        let snapshot = {
            let conn = self.lock();
            let document = match Self::existing_document(&conn, contract_id, &key)? {
                Some(mut existing) => {
                    merge_document(&mut existing, encoded);
                    existing
                }
                None => encoded,
            };
            conn.execute(
                "INSERT OR REPLACE INTO clauses VALUES (?, ?, ?)",
                params![contract_id, key, serde_json::to_string(&document)?],
            )?;
            Self::bump_revision(&conn, contract_id)?;
            Self::snapshot(&conn, contract_id)?
        };
        debug!(contract = contract_id, key = %key, revision = snapshot.revision, "saved clause");
        self.subscribers.publish(contract_id, &snapshot);
        Ok(())
    }

    async fn delete_clause(&self, contract_id: &str, clause_key: &str) -> Result<(), StoreError> {
        self.auth.require()?;
        let snapshot = {
            let conn = self.lock();
            let removed = conn.execute(
                "DELETE FROM clauses WHERE contract_id = ? AND clause_key = ?",
                [contract_id, clause_key],
            )?;
            if removed == 0 {
                return Err(StoreError::NotFound(format!(
                    "clause {clause_key} in {contract_id}"
                )));
            }
            Self::bump_revision(&conn, contract_id)?;
            Self::snapshot(&conn, contract_id)?
        };
        info!(contract = contract_id, key = clause_key, "deleted clause");
        self.subscribers.publish(contract_id, &snapshot);
        Ok(())
    }

    fn subscribe_clauses(&self, contract_id: &str) -> Result<Subscription, StoreError> {
        self.auth.require()?;
        // Registered under the connection lock: any write not in `initial`
        // publishes after this feed exists.
        let conn = self.lock();
        let initial = Self::snapshot(&conn, contract_id)?;
        Ok(self.subscribers.add(contract_id, initial))
    }
}

#[async_trait]
impl ProfileStore for DuckStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
        self.auth.require()?;
        let conn = self.lock();
        Self::read_profile(&conn, uid)
    }

    async fn create_profile(&self, uid: &str, email: &str) -> Result<UserProfile, StoreError> {
        self.auth.require()?;
        let conn = self.lock();
        if Self::read_profile(&conn, uid)?.is_some() {
            return Err(StoreError::AlreadyExists(format!("profile {uid}")));
        }
        let profile = UserProfile {
            email: email.to_string(),
            role: Role::for_new_account(Self::profile_count(&conn)?),
            created_at: iso_timestamp(Utc::now()),
        };
        conn.execute(
            "INSERT INTO users VALUES (?, ?, ?, ?)",
            params![uid, profile.email, profile.role.as_str(), profile.created_at],
        )?;
        info!(email, role = profile.role.as_str(), "created user profile");
        Ok(profile)
    }

    async fn set_role(&self, uid: &str, role: Role) -> Result<UserProfile, StoreError> {
        self.auth.require()?;
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE users SET role = ? WHERE uid = ?",
            [role.as_str(), uid],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("profile {uid}")));
        }
        Self::read_profile(&conn, uid)?
            .ok_or_else(|| StoreError::NotFound(format!("profile {uid}")))
    }

    async fn list_profiles(&self) -> Result<Vec<(String, UserProfile)>, StoreError> {
        self.auth.require()?;
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT uid, email, role, created_at FROM users ORDER BY created_at")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut profiles = Vec::new();
        for row in rows {
            let (uid, email, role, created_at) = row?;
            profiles.push((
                uid,
                UserProfile {
                    email,
                    role: parse_role(&role)?,
                    created_at,
                },
            ));
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;

    fn auth() -> AuthHandle {
        AuthHandle::signed_in(Identity {
            uid: "u1".into(),
            email: "admin@example.com".into(),
        })
    }

    #[tokio::test]
    async fn open_in_memory_is_empty() {
        let store = DuckStore::open(auth()).unwrap();
        assert!(store.load_contracts().await.unwrap().is_empty());
        assert_eq!(store.load_snapshot("Red").await.unwrap(), ClauseSnapshot::default());
    }

    #[tokio::test]
    async fn requires_identity() {
        let store = DuckStore::open(AuthHandle::new()).unwrap();
        assert!(matches!(
            store.load_clauses("Red").await,
            Err(StoreError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn save_merges_and_sorts() {
        let store = DuckStore::open(auth()).unwrap();
        let mut first = Clause::new("2.10", "Permits", "body");
        first.general_condition = Some("baseline".into());
        store.save_clause("Red", &first).await.unwrap();
        store.save_clause("Red", &Clause::new("2.1", "Access", "")).await.unwrap();
        store
            .save_clause("Red", &Clause::new("2.10", "Permits", "edited"))
            .await
            .unwrap();

        let snapshot = store.load_snapshot("Red").await.unwrap();
        assert_eq!(snapshot.revision, 3);
        assert_eq!(snapshot.clauses.len(), 2);
        assert_eq!(snapshot.clauses[0].clause_number, "2.1");
        assert_eq!(snapshot.clauses[1].clause_text, "edited");
        assert_eq!(snapshot.clauses[1].general_condition.as_deref(), Some("baseline"));
    }

    #[tokio::test]
    async fn contract_meta_round_trip() {
        let store = DuckStore::open(auth()).unwrap();
        store.create_contract("Red", "Red Book").await.unwrap();
        assert!(store.create_contract("Red", "Again").await.unwrap_err().is_already_exists());
        let summary = store.get_contract("Red").await.unwrap();
        assert_eq!(summary.meta.title, "Red Book");
        assert_eq!(store.load_contracts().await.unwrap().len(), 1);
        assert!(matches!(
            store.get_contract("Missing").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_publishes_to_subscribers() {
        let store = DuckStore::open(auth()).unwrap();
        store.save_clause("Red", &Clause::new("1", "", "")).await.unwrap();
        let mut feed = store.subscribe_clauses("Red").unwrap();
        assert_eq!(feed.recv().await.unwrap().clauses.len(), 1);

        store.delete_clause("Red", "C.1").await.unwrap();
        let pushed = feed.recv().await.unwrap();
        assert!(pushed.clauses.is_empty());
        assert_eq!(pushed.revision, 2);
        assert!(matches!(
            store.delete_clause("Red", "C.1").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn profiles_bootstrap_admin() {
        let store = DuckStore::open(auth()).unwrap();
        assert_eq!(store.create_profile("u1", "a@x.com").await.unwrap().role, Role::Admin);
        assert_eq!(store.create_profile("u2", "b@x.com").await.unwrap().role, Role::Pending);
        assert_eq!(store.set_role("u2", Role::Viewer).await.unwrap().role, Role::Viewer);
        assert_eq!(store.list_profiles().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn persistent_reopen_keeps_data() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("clausebook.duckdb");

        let store = DuckStore::open_persistent(auth(), &path).unwrap();
        store.create_contract("Red", "Red Book").await.unwrap();
        store.save_clause("Red", &Clause::new("1", "General", "")).await.unwrap();
        drop(store);

        let store = DuckStore::open_persistent(auth(), &path).unwrap();
        assert_eq!(store.load_clauses("Red").await.unwrap().len(), 1);
        assert_eq!(store.load_snapshot("Red").await.unwrap().revision, 1);
    }
}
