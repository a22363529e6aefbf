use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use keepsake_api::views::load_view;
use keepsake_store::SharedBackend;
use keepsake_types::events::{GatewayCommand, GatewayEvent, View};

use crate::live::{LiveView, ViewUpdate};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Outgoing events waiting for the socket.
const OUTBOX_CAPACITY: usize = 64;

/// A watched view: forwards its updates to the connection's outbox until
/// dropped.
struct Watch {
    task: JoinHandle<()>,
}

impl Watch {
    fn start(backend: SharedBackend, view: View, out: mpsc::Sender<GatewayEvent>) -> Self {
        let mut live = LiveView::spawn(backend, &[view.table()], move |backend: SharedBackend| {
            async move { load_view(backend.as_ref(), view).await }
        });

        let task = tokio::spawn(async move {
            while let Some(update) = live.next().await {
                let event = match update {
                    ViewUpdate::Snapshot(data) => GatewayEvent::Snapshot { view, data },
                    ViewUpdate::Failed(message) => GatewayEvent::ViewError { view, message },
                };
                if out.send(event).await.is_err() {
                    break;
                }
            }
        });

        Self { task }
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The views one client is watching.
pub struct Session {
    backend: SharedBackend,
    out: mpsc::Sender<GatewayEvent>,
    watches: HashMap<View, Watch>,
}

impl Session {
    pub fn new(backend: SharedBackend, out: mpsc::Sender<GatewayEvent>) -> Self {
        Self {
            backend,
            out,
            watches: HashMap::new(),
        }
    }

    /// `Watch` always answers with a fresh snapshot, restarting the view if
    /// it was already watched.
    pub fn apply(&mut self, cmd: GatewayCommand) {
        match cmd {
            GatewayCommand::Watch { view } => {
                debug!("Watching {:?}", view);
                let watch = Watch::start(self.backend.clone(), view, self.out.clone());
                self.watches.insert(view, watch);
            }
            GatewayCommand::Unwatch { view } => {
                if self.watches.remove(&view).is_none() {
                    debug!("Unwatch of {:?}, which was not watched", view);
                }
            }
        }
    }

    pub fn is_watching(&self, view: View) -> bool {
        self.watches.contains_key(&view)
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }
}

fn encode(event: &GatewayEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            error!("Failed to encode gateway event: {}", e);
            None
        }
    }
}

/// Run one gateway connection until the client leaves or stops answering
/// pings. Every view the client watched is released on the way out.
pub async fn handle_connection(socket: WebSocket, backend: SharedBackend) {
    let (mut sender, mut receiver) = socket.split();

    info!("Client connected to gateway");

    let ready = GatewayEvent::Ready {
        views: View::ALL.to_vec(),
    };
    let Some(ready) = encode(&ready) else { return };
    if sender.send(ready).await.is_err() {
        return;
    }

    let (out_tx, mut out_rx) = mpsc::channel::<GatewayEvent>(OUTBOX_CAPACITY);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // View updates -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = out_rx.recv() => {
                    let Some(event) = event else { break };
                    let Some(msg) = encode(&event) else { continue };
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Commands from client. The session, and with it every watch, lives here.
    let mut recv_task = tokio::spawn(async move {
        let mut session = Session::new(backend, out_tx);
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => session.apply(cmd),
                    Err(e) => {
                        let raw: String = text.chars().take(200).collect();
                        warn!("Bad gateway command: {} -- raw: {}", e, raw);
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("Client disconnected from gateway");
}

#[cfg(test)]
mod tests {
    use super::*;

    use keepsake_store::local::LocalBackend;
    use keepsake_types::events::ViewData;

    async fn session() -> (Session, mpsc::Receiver<GatewayEvent>, Arc<LocalBackend>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            LocalBackend::open(
                &dir.path().join("keepsake.db"),
                dir.path().join("storage"),
                "http://localhost:3000",
            )
            .await
            .unwrap(),
        );
        let (tx, rx) = mpsc::channel(16);
        (Session::new(backend.clone(), tx), rx, backend, dir)
    }

    async fn next_event(rx: &mut mpsc::Receiver<GatewayEvent>) -> GatewayEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event")
            .expect("outbox closed")
    }

    #[tokio::test]
    async fn watch_sends_snapshot() {
        let (mut session, mut rx, _backend, _dir) = session().await;
        session.apply(GatewayCommand::Watch { view: View::Gallery });

        match next_event(&mut rx).await {
            GatewayEvent::Snapshot { view, data } => {
                assert_eq!(view, View::Gallery);
                assert_eq!(data, ViewData::Gallery(vec![]));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(session.is_watching(View::Gallery));
    }

    #[tokio::test]
    async fn unwatch_releases_subscription() {
        let (mut session, mut rx, backend, _dir) = session().await;
        session.apply(GatewayCommand::Watch { view: View::Notes });
        session.apply(GatewayCommand::Watch { view: View::Memories });
        next_event(&mut rx).await;
        next_event(&mut rx).await;
        assert_eq!(backend.feed().subscriber_count(), 2);

        session.apply(GatewayCommand::Unwatch { view: View::Notes });
        session.apply(GatewayCommand::Unwatch { view: View::Notes });
        assert_eq!(session.watch_count(), 1);

        drop(session);
        tokio::time::timeout(Duration::from_secs(5), async {
            while backend.feed().subscriber_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("watches were not released");
    }
}
