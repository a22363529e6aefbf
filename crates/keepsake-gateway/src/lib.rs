//! Live views over WebSocket.
//!
//! A client connects to `/gateway`, receives `Ready`, then sends `Watch` /
//! `Unwatch` commands. Each watched view pushes a full `Snapshot` on watch
//! and again after every change to its table.

pub mod connection;
pub mod live;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use keepsake_store::SharedBackend;

pub use live::{LiveView, ViewUpdate};

pub fn routes(backend: SharedBackend) -> Router {
    Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(backend)
}

async fn ws_upgrade(State(backend): State<SharedBackend>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, backend))
}
