//! In-memory clause state for the active contract.
//!
//! Each activation moves through `Loading -> Live`. While loading, store
//! pushes are queued; a non-empty push is also shown at once so the screen
//! never waits on a slow initial read, while an empty push is held back
//! because it may be a stale notification racing the load. When the initial
//! load completes, the newest of the load result and the queued pushes (by
//! store revision) wins. Once live, every push at or above the current
//! revision is applied and older ones are dropped.
//!
//! Every activation takes a new generation. Calls carrying an older
//! [`Ticket`] belong to an abandoned flow and are ignored.

use clausebook_core::Clause;
use clausebook_store::{ClauseSnapshot, StoreError};
use tracing::debug;

/// Identifies one activation of one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No active contract, or signed out.
    Idle,
    Loading { contract_id: String },
    Live { contract_id: String },
}

#[derive(Debug)]
pub struct ClauseView {
    phase: Phase,
    generation: u64,
    clauses: Vec<Clause>,
    revision: Option<u64>,
    queue: Vec<ClauseSnapshot>,
    error: Option<String>,
}

impl Default for ClauseView {
    fn default() -> Self {
        Self::new()
    }
}

impl ClauseView {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            clauses: Vec::new(),
            revision: None,
            queue: Vec::new(),
            error: None,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn contract_id(&self) -> Option<&str> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Loading { contract_id } | Phase::Live { contract_id } => Some(contract_id),
        }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.generation && self.phase != Phase::Idle
    }

    /// Make `contract_id` active and enter `Loading`.
    ///
    /// With no contract, or a viewer not allowed to see contract content, the
    /// view is emptied and no ticket is issued.
    pub fn activate(&mut self, contract_id: Option<&str>, may_view: bool) -> Option<Ticket> {
        self.generation += 1;
        self.queue.clear();
        self.revision = None;
        self.error = None;
        match contract_id {
            Some(id) if may_view => {
                self.phase = Phase::Loading {
                    contract_id: id.to_string(),
                };
                Some(Ticket(self.generation))
            }
            _ => {
                self.phase = Phase::Idle;
                self.clauses.clear();
                None
            }
        }
    }

    /// Empty the view, as on sign-out.
    pub fn deactivate(&mut self) {
        self.activate(None, false);
    }

    /// A snapshot pushed by the store's change feed.
    pub fn on_push(&mut self, ticket: Ticket, snapshot: ClauseSnapshot) {
        if !self.is_current(ticket) {
            debug!(revision = snapshot.revision, "dropping push from an abandoned activation");
            return;
        }
        match self.phase {
            Phase::Loading { .. } => {
                if !snapshot.clauses.is_empty() {
                    self.adopt(snapshot.clone());
                } else {
                    debug!(revision = snapshot.revision, "holding empty push until load completes");
                }
                self.queue.push(snapshot);
            }
            Phase::Live { .. } => {
                if self.revision.is_some_and(|current| snapshot.revision < current) {
                    debug!(
                        revision = snapshot.revision,
                        current = self.revision,
                        "dropping out-of-order push"
                    );
                    return;
                }
                self.adopt(snapshot);
            }
            Phase::Idle => {}
        }
    }

    /// The initial load finished. Moves the view to `Live`.
    ///
    /// On failure the clause list is left exactly as it was and the error is
    /// recorded.
    pub fn complete_load(&mut self, ticket: Ticket, result: Result<ClauseSnapshot, StoreError>) {
        if !self.is_current(ticket) {
            debug!("dropping load result from an abandoned activation");
            return;
        }
        let Phase::Loading { contract_id } = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return;
        };
        let queued = std::mem::take(&mut self.queue);

        match result {
            Ok(loaded) => {
                // Ties go to the load result: same revision, same contents.
                let newest = queued
                    .into_iter()
                    .filter(|push| push.revision > loaded.revision)
                    .max_by_key(|push| push.revision)
                    .unwrap_or(loaded);
                // A push adopted while loading may already be newer still.
                if self.revision.is_none_or(|shown| newest.revision >= shown) {
                    self.adopt(newest);
                }
            }
            Err(e) => {
                self.error = Some(e.to_string());
            }
        }
        self.phase = Phase::Live { contract_id };
    }

    /// Apply a snapshot read directly from the store, such as the reload
    /// after a write.
    pub fn apply_reload(&mut self, snapshot: ClauseSnapshot) {
        if let Phase::Live { .. } = self.phase {
            if self.revision.is_some_and(|current| snapshot.revision < current) {
                return;
            }
            self.adopt(snapshot);
        }
    }

    /// Record a failure from a flow acting on this view without touching the list.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn adopt(&mut self, snapshot: ClauseSnapshot) {
        self.revision = Some(snapshot.revision);
        self.clauses = snapshot.clauses;
    }
}
