//! Drives a [`ClauseView`] from the store: subscribe, load, and forward pushes.

use std::sync::{Arc, Mutex, MutexGuard};

use clausebook_core::{Clause, Role};
use clausebook_store::{ClauseStore, LegacyArchive};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::migrate::migrate_contract;
use crate::view::{ClauseView, Ticket};

/// The active contract of one session.
///
/// Switching contracts abandons the previous feed; its pending pushes and any
/// in-flight load are ignored by generation.
pub struct ContractSession {
    store: Arc<dyn ClauseStore>,
    archive: Option<Arc<dyn LegacyArchive>>,
    view: Arc<Mutex<ClauseView>>,
    changed: watch::Sender<u64>,
    feed: Option<JoinHandle<()>>,
}

impl ContractSession {
    pub fn new(store: Arc<dyn ClauseStore>) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            store,
            archive: None,
            view: Arc::new(Mutex::new(ClauseView::new())),
            changed,
            feed: None,
        }
    }

    /// Archive searched when an admin opens a contract the store has no clauses for.
    pub fn with_archive(mut self, archive: Arc<dyn LegacyArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Read access to the view. Do not hold across an await.
    pub fn view(&self) -> MutexGuard<'_, ClauseView> {
        lock(&self.view)
    }

    pub fn clauses(&self) -> Vec<Clause> {
        self.view().clauses().to_vec()
    }

    /// Ticks whenever the view changes.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    /// Make `contract_id` active for a user with `role`.
    ///
    /// `None` for either argument, or a role without view access, empties the
    /// view. Load failures land in the view's error slot; the previous list
    /// stays visible.
    pub async fn open(&mut self, contract_id: Option<&str>, role: Option<Role>) {
        self.stop_feed();
        let may_view = role.is_some_and(|r| r.capabilities().can_view);
        let ticket = lock(&self.view).activate(contract_id, may_view);
        self.notify();
        let (Some(ticket), Some(contract_id), Some(role)) = (ticket, contract_id, role) else {
            return;
        };

        self.start_feed(ticket, contract_id);

        let mut result = self.store.load_snapshot(contract_id).await;
        let store_empty = result.as_ref().is_ok_and(|s| s.clauses.is_empty());
        if let Some(archive) = self.archive.as_ref().filter(|_| store_empty && role == Role::Admin) {
            match migrate_contract(self.store.as_ref(), archive.as_ref(), contract_id).await {
                Ok(Some(_)) => result = self.store.load_snapshot(contract_id).await,
                Ok(None) => {}
                Err(e) => warn!(contract = contract_id, error = %e, "on-demand migration failed"),
            }
        }

        if let Err(e) = &result {
            warn!(contract = contract_id, error = %e, "clause load failed");
        }
        lock(&self.view).complete_load(ticket, result);
        self.notify();
        info!(contract = contract_id, "contract live");
    }

    /// Re-read the active contract, as after a write made elsewhere in the session.
    pub async fn reload(&self) {
        let Some(contract_id) = self.view().contract_id().map(str::to_string) else {
            return;
        };
        match self.store.load_snapshot(&contract_id).await {
            Ok(snapshot) => lock(&self.view).apply_reload(snapshot),
            Err(e) => {
                warn!(contract = %contract_id, error = %e, "clause reload failed");
                lock(&self.view).set_error(e.to_string());
            }
        }
        self.notify();
    }

    /// Drop the active contract, as on sign-out.
    pub fn close(&mut self) {
        self.stop_feed();
        lock(&self.view).deactivate();
        self.notify();
    }

    fn start_feed(&mut self, ticket: Ticket, contract_id: &str) {
        let mut subscription = match self.store.subscribe_clauses(contract_id) {
            Ok(sub) => sub,
            Err(e) => {
                warn!(contract = contract_id, error = %e, "clause feed unavailable");
                return;
            }
        };
        let view = Arc::clone(&self.view);
        let changed = self.changed.clone();
        self.feed = Some(tokio::spawn(async move {
            while let Some(snapshot) = subscription.recv().await {
                debug!(
                    contract = subscription.contract_id(),
                    revision = snapshot.revision,
                    "clause push"
                );
                let applied = {
                    let mut view = lock(&view);
                    let current = view.is_current(ticket);
                    if current {
                        view.on_push(ticket, snapshot);
                    }
                    current
                };
                if !applied {
                    break;
                }
                changed.send_modify(|n| *n += 1);
            }
        }));
    }

    fn stop_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }

    fn notify(&self) {
        self.changed.send_modify(|n| *n += 1);
    }
}

impl Drop for ContractSession {
    fn drop(&mut self) {
        self.stop_feed();
    }
}

fn lock(view: &Mutex<ClauseView>) -> MutexGuard<'_, ClauseView> {
    view.lock().unwrap_or_else(|e| e.into_inner())
}
