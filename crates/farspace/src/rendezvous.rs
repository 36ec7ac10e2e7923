//! # Rendezvous Store
//!
//! Pairs late-arriving execution events with waiting callers. A transaction
//! is either pending (a waiter holds the receiving half of a oneshot
//! channel) or delivered (the result arrived before anyone waited and is
//! buffered). The first reader consumes the single result, after which the
//! transaction is forgotten.
//!
//! A waiter that times out abandons its transaction id; a later post for an
//! abandoned id is discarded instead of buffered, so a stale reply can never
//! confuse a future transaction.

use dashmap::DashMap;
use dashmap::DashSet;
use tokio::sync::oneshot;
use tokio::time::Duration;

use farwire::ExecutionEvent;
use farwire::TransactionId;

/// Thread-safe mailbox keyed by transaction id.
pub struct Rendezvous {
    pending: DashMap<TransactionId, oneshot::Sender<ExecutionEvent>>,
    delivered: DashMap<TransactionId, ExecutionEvent>,
    abandoned: DashSet<TransactionId>,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            delivered: DashMap::new(),
            abandoned: DashSet::new(),
        }
    }

    /// Completes a transaction. Idempotent: a surplus or stale post is handed
    /// back to the caller (for release to the event pool) instead of stored.
    pub fn post(&self, event: ExecutionEvent) -> Option<ExecutionEvent> {
        let transaction_id = event.transaction_id;
        if self.abandoned.remove(&transaction_id).is_some() {
            tracing::debug!(%transaction_id, "discarding post for abandoned transaction");
            return Some(event);
        }
        if let Some((_, waiter)) = self.pending.remove(&transaction_id) {
            // A send error means the waiter gave up concurrently.
            return waiter.send(event).err();
        }
        if self.delivered.contains_key(&transaction_id) {
            tracing::debug!(%transaction_id, "dropping surplus post");
            return Some(event);
        }
        self.delivered.insert(transaction_id, event);
        None
    }

    /// Blocks until the transaction's result is posted or the deadline
    /// expires. `timeout_ms <= 0` waits without bound. Returns `None` on
    /// timeout or cancellation, abandoning the transaction id.
    pub async fn wait(
        &self,
        transaction_id: TransactionId,
        timeout_ms: i64,
    ) -> Option<ExecutionEvent> {
        if let Some((_, event)) = self.delivered.remove(&transaction_id) {
            return Some(event);
        }

        let (tx, rx) = oneshot::channel();
        self.pending.insert(transaction_id, tx);

        // The result may have been buffered between the check and the insert.
        if let Some((_, event)) = self.delivered.remove(&transaction_id) {
            self.pending.remove(&transaction_id);
            return Some(event);
        }

        let outcome = if timeout_ms > 0 {
            match tokio::time::timeout(Duration::from_millis(timeout_ms as u64), rx).await {
                Ok(received) => received.ok(),
                Err(_) => None,
            }
        } else {
            rx.await.ok()
        };

        if outcome.is_none() {
            self.pending.remove(&transaction_id);
            self.abandoned.insert(transaction_id);
            tracing::debug!(%transaction_id, "waiter abandoned transaction");
        }
        outcome
    }

    /// Drops the pending waiter slot, waking the waiter empty-handed.
    /// Used when the connection carrying the transaction goes away.
    pub fn cancel(&self, transaction_id: TransactionId) {
        self.pending.remove(&transaction_id);
    }

    pub fn contains_pending(&self, transaction_id: TransactionId) -> bool {
        self.pending.contains_key(&transaction_id)
    }

    pub fn contains_delivered(&self, transaction_id: TransactionId) -> bool {
        self.delivered.contains_key(&transaction_id)
    }
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}
