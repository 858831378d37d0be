//! Who is signed in, what their role lets them do, and the role-gated
//! operations built on top.

use std::sync::Arc;

use chrono::Utc;
use clausebook_ai::{BatchDriver, Progress, SourceInput};
use clausebook_core::{Capabilities, Clause, ContractSummary, Role, UserProfile, search_clauses};
use clausebook_store::{
    AuthHandle, ClauseStore, FlagStore, Identity, LegacyArchive, ProfileStore, StoreError,
};
use tracing::{info, warn};

use crate::SyncError;
use crate::backup::{ImportOutcome, export_contract, import_backup};
use crate::finalize::{FinalizeOutcome, finalize};
use crate::migrate::{MigrationProgress, MigrationReport, migrate_archive, migrate_if_needed};

/// A resolved, signed-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUser {
    pub identity: Identity,
    pub profile: UserProfile,
}

impl ActiveUser {
    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn capabilities(&self) -> Capabilities {
        self.profile.role.capabilities()
    }

    /// Pending accounts see only the approval-wait state.
    pub fn is_pending(&self) -> bool {
        self.profile.role == Role::Pending
    }

    fn require_view(&self) -> Result<(), SyncError> {
        gate(self.capabilities().can_view, "view contracts")
    }

    fn require_edit(&self) -> Result<(), SyncError> {
        gate(self.capabilities().can_edit, "edit clauses")
    }

    fn require_delete(&self) -> Result<(), SyncError> {
        gate(self.capabilities().can_delete, "delete clauses")
    }

    fn require_upload(&self) -> Result<(), SyncError> {
        gate(self.capabilities().can_upload, "upload contracts")
    }
}

fn gate(allowed: bool, action: &'static str) -> Result<(), SyncError> {
    if allowed { Ok(()) } else { Err(SyncError::Forbidden(action)) }
}

/// Everything a session talks to. The migration check runs at most once per
/// controller.
pub struct SessionController {
    auth: AuthHandle,
    store: Arc<dyn ClauseStore>,
    profiles: Arc<dyn ProfileStore>,
    archive: Arc<dyn LegacyArchive>,
    flags: Arc<dyn FlagStore>,
    migration_checked: bool,
}

impl SessionController {
    pub fn new(
        auth: AuthHandle,
        store: Arc<dyn ClauseStore>,
        profiles: Arc<dyn ProfileStore>,
        archive: Arc<dyn LegacyArchive>,
        flags: Arc<dyn FlagStore>,
    ) -> Self {
        Self {
            auth,
            store,
            profiles,
            archive,
            flags,
            migration_checked: false,
        }
    }

    pub fn store(&self) -> &Arc<dyn ClauseStore> {
        &self.store
    }

    pub fn archive(&self) -> &Arc<dyn LegacyArchive> {
        &self.archive
    }

    /// Map the signed-in identity to its profile, creating one on first sight.
    ///
    /// `None` when nobody is signed in. Store failures are logged and treated
    /// as signed out.
    pub async fn resolve(&self) -> Option<ActiveUser> {
        let identity = self.auth.current()?;
        match self.profile_for(&identity).await {
            Ok(profile) => Some(ActiveUser { identity, profile }),
            Err(e) => {
                warn!(email = %identity.email, error = %e, "could not resolve profile");
                None
            }
        }
    }

    async fn profile_for(&self, identity: &Identity) -> Result<UserProfile, StoreError> {
        if let Some(profile) = self.profiles.get_profile(&identity.uid).await? {
            return Ok(profile);
        }
        match self.profiles.create_profile(&identity.uid, &identity.email).await {
            Ok(profile) => Ok(profile),
            // Raced with another session creating the same profile.
            Err(e) if e.is_already_exists() => self
                .profiles
                .get_profile(&identity.uid)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("profile {}", identity.uid))),
            Err(e) => Err(e),
        }
    }

    /// The post-sign-in legacy migration. Admin only, once per controller,
    /// and only while the device flag says it has not completed.
    pub async fn migrate_after_sign_in(
        &mut self,
        user: &ActiveUser,
        progress: &mut (dyn FnMut(MigrationProgress) + Send),
    ) -> Result<Option<MigrationReport>, SyncError> {
        if user.role() != Role::Admin || self.migration_checked {
            return Ok(None);
        }
        self.migration_checked = true;
        migrate_if_needed(
            self.store.as_ref(),
            self.archive.as_ref(),
            self.flags.as_ref(),
            progress,
        )
        .await
    }

    /// Run the bulk migration now, regardless of the device flag.
    pub async fn migrate_now(
        &self,
        user: &ActiveUser,
        progress: &mut (dyn FnMut(MigrationProgress) + Send),
    ) -> Result<MigrationReport, SyncError> {
        user.require_upload()?;
        migrate_archive(
            self.store.as_ref(),
            self.archive.as_ref(),
            self.flags.as_ref(),
            progress,
        )
        .await
    }

    pub async fn contracts(&self, user: &ActiveUser) -> Result<Vec<ContractSummary>, SyncError> {
        user.require_view()?;
        Ok(self.store.load_contracts().await?)
    }

    pub async fn clauses(&self, user: &ActiveUser, contract_id: &str) -> Result<Vec<Clause>, SyncError> {
        user.require_view()?;
        Ok(self.store.load_clauses(contract_id).await?)
    }

    /// Clauses of one contract matching `query`, in canonical order.
    pub async fn search(
        &self,
        user: &ActiveUser,
        contract_id: &str,
        query: &str,
    ) -> Result<Vec<Clause>, SyncError> {
        let clauses = self.clauses(user, contract_id).await?;
        Ok(search_clauses(&clauses, query).into_iter().cloned().collect())
    }

    pub async fn save_clause(
        &self,
        user: &ActiveUser,
        contract_id: &str,
        clause: &Clause,
    ) -> Result<(), SyncError> {
        user.require_edit()?;
        let mut clause = clause.clone();
        clause.refresh_derived();
        Ok(self.store.save_clause(contract_id, &clause).await?)
    }

    pub async fn delete_clause(
        &self,
        user: &ActiveUser,
        contract_id: &str,
        clause_key: &str,
    ) -> Result<(), SyncError> {
        user.require_delete()?;
        Ok(self.store.delete_clause(contract_id, clause_key).await?)
    }

    /// Extract clauses from `input` and finalize them into the store.
    ///
    /// Nothing is written unless every extraction call succeeds.
    pub async fn analyze(
        &self,
        user: &ActiveUser,
        driver: &BatchDriver<'_>,
        input: SourceInput,
        progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<FinalizeOutcome, SyncError> {
        user.require_upload()?;
        let clauses = driver.run(input, progress).await?;
        finalize(self.store.as_ref(), clauses, Utc::now()).await
    }

    pub async fn import_backup(&self, user: &ActiveUser, json: &str) -> Result<ImportOutcome, SyncError> {
        user.require_upload()?;
        import_backup(self.store.as_ref(), json, Utc::now()).await
    }

    /// `(file name, body)` of a backup for one contract.
    pub async fn export_backup(
        &self,
        user: &ActiveUser,
        contract_id: &str,
    ) -> Result<(String, String), SyncError> {
        user.require_view()?;
        export_contract(self.store.as_ref(), contract_id, Utc::now()).await
    }

    pub async fn list_users(&self, user: &ActiveUser) -> Result<Vec<(String, UserProfile)>, SyncError> {
        gate(user.role() == Role::Admin, "manage users")?;
        Ok(self.profiles.list_profiles().await?)
    }

    /// Change another account's role. Admin only.
    pub async fn set_role(
        &self,
        user: &ActiveUser,
        uid: &str,
        role: Role,
    ) -> Result<UserProfile, SyncError> {
        gate(user.role() == Role::Admin, "manage users")?;
        let profile = self.profiles.set_role(uid, role).await?;
        info!(uid, email = %profile.email, role = role.as_str(), "role changed");
        Ok(profile)
    }
}
