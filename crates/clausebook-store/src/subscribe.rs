//! Per-contract change feeds.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use crate::adapter::ClauseSnapshot;

/// Receiving end of a clause feed. Dropping it unsubscribes.
pub struct Subscription {
    contract_id: String,
    rx: mpsc::UnboundedReceiver<ClauseSnapshot>,
}

impl Subscription {
    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    /// Wait for the next snapshot. `None` once the store goes away.
    pub async fn recv(&mut self) -> Option<ClauseSnapshot> {
        self.rx.recv().await
    }

    /// Next snapshot if one is already queued.
    pub fn try_recv(&mut self) -> Option<ClauseSnapshot> {
        self.rx.try_recv().ok()
    }
}

/// Registry of open feeds, keyed by contract id.
#[derive(Default)]
pub(crate) struct Subscribers {
    feeds: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<ClauseSnapshot>>>>,
}

impl Subscribers {
    /// Open a feed and queue `initial` as its first delivery.
    pub fn add(&self, contract_id: &str, initial: ClauseSnapshot) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(initial);
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        feeds.entry(contract_id.to_string()).or_default().push(tx);
        Subscription {
            contract_id: contract_id.to_string(),
            rx,
        }
    }

    /// Deliver `snapshot` to every open feed for the contract, pruning closed ones.
    pub fn publish(&self, contract_id: &str, snapshot: &ClauseSnapshot) {
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        let Some(senders) = feeds.get_mut(contract_id) else {
            return;
        };
        senders.retain(|tx| tx.send(snapshot.clone()).is_ok());
        debug!(
            contract = contract_id,
            revision = snapshot.revision,
            subscribers = senders.len(),
            "published clause snapshot"
        );
        if senders.is_empty() {
            feeds.remove(contract_id);
        }
    }

    /// Open feeds whose receiver is still alive.
    pub fn count(&self, contract_id: &str) -> usize {
        let feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        feeds
            .get(contract_id)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }
}
