use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{trace, warn};

use keepsake_types::events::{ChangeEvent, Table};

const FEED_CAPACITY: usize = 256;

/// Fans change notifications out to every live subscription.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    /// Broadcast channel for change events; every subscription sees every event
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(FeedInner { tx }),
        }
    }

    /// Notify all subscriptions. No-op when nobody listens.
    pub fn publish(&self, event: ChangeEvent) {
        trace!("change on {}: {:?}", event.table.as_str(), event.kind);
        let _ = self.inner.tx.send(event);
    }

    pub fn subscribe(&self, tables: &[Table]) -> Subscription {
        Subscription {
            rx: self.inner.tx.subscribe(),
            tables: tables.to_vec(),
        }
    }

    /// Number of subscriptions currently alive.
    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }
}

/// What a subscription hands back: a change, or proof that some were missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Changed(ChangeEvent),
    /// The subscriber fell behind and `n` events were discarded. Treat as
    /// "something changed".
    Lagged(u64),
}

/// Interest in changes to a set of tables.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    tables: Vec<Table>,
}

impl Subscription {
    /// Wait for the next change on one of the watched tables. Returns `None`
    /// once the feed is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.tables.contains(&event.table) => {
                    return Some(Notification::Changed(event));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!("Change subscription lagged by {} events", n);
                    return Some(Notification::Lagged(n));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Discard everything already queued. Returns how many relevant
    /// notifications were skipped.
    pub fn drain(&mut self) -> usize {
        let mut skipped = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.tables.contains(&event.table) => skipped += 1,
                Ok(_) => {}
                Err(TryRecvError::Lagged(_)) => skipped += 1,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return skipped,
            }
        }
    }

    /// Release the subscription. Same as dropping it.
    pub fn unsubscribe(self) {}
}
