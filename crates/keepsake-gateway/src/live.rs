//! Self-refreshing views over backend tables.

use std::fmt::Display;
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use keepsake_store::{Notification, SharedBackend};
use keepsake_types::events::Table;

/// Queued updates per view before the loader waits on the consumer.
const UPDATE_BUFFER: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate<T> {
    /// Complete, current contents. Replaces the previous snapshot.
    Snapshot(T),
    /// A fetch failed. The previous snapshot is still the latest one.
    Failed(String),
}

/// A list kept current by re-fetching it whenever one of its tables changes.
///
/// The change subscription is taken before the first fetch, so a write that
/// lands while that fetch runs still triggers a refresh. Dropping the view
/// (or calling [`LiveView::close`]) stops the task and releases the
/// subscription; a fetch in flight at that point is discarded.
pub struct LiveView<T> {
    rx: mpsc::Receiver<ViewUpdate<T>>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> LiveView<T> {
    pub fn spawn<F, Fut, E>(backend: SharedBackend, tables: &[Table], loader: F) -> Self
    where
        F: Fn(SharedBackend) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send,
        E: Display + Send,
    {
        let mut subscription = backend.subscribe(tables);
        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);

        let task = tokio::spawn(async move {
            loop {
                let update = match loader(backend.clone()).await {
                    Ok(data) => ViewUpdate::Snapshot(data),
                    Err(e) => {
                        warn!("Live view fetch failed: {}", e);
                        ViewUpdate::Failed(e.to_string())
                    }
                };
                if tx.send(update).await.is_err() {
                    break;
                }

                match subscription.recv().await {
                    Some(Notification::Changed(event)) => {
                        trace!("{} {:?}, refreshing", event.table.as_str(), event.kind);
                    }
                    Some(Notification::Lagged(n)) => {
                        trace!("Missed {} changes, refreshing", n);
                    }
                    None => break,
                }
                // One fetch covers everything queued so far
                subscription.drain();
            }
        });

        Self { rx, task }
    }
}

impl<T> LiveView<T> {
    /// Wait for the next update. `None` once the view has stopped.
    pub async fn next(&mut self) -> Option<ViewUpdate<T>> {
        self.rx.recv().await
    }

    pub fn close(self) {}
}

impl<T> Drop for LiveView<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
