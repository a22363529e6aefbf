use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use keepsake_store::Backend;
use keepsake_store::local::LocalBackend;
use keepsake_types::models::{NewNote, Sender};

type Client = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn serve() -> (String, Arc<LocalBackend>, tempfile::TempDir) {
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

    let app = keepsake_gateway::routes(backend.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{}/gateway", addr), backend, dir)
}

/// Next JSON event, skipping control frames.
async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn command(ws: &mut Client, body: Value) {
    ws.send(Message::Text(body.to_string().into())).await.unwrap();
}

#[tokio::test]
async fn watched_notes_follow_writes() {
    let (url, backend, _dir) = serve().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let ready = next_json(&mut ws).await;
    assert_eq!(ready["type"], "Ready");
    assert_eq!(ready["data"]["views"], json!(["gallery", "memories", "notes"]));

    command(&mut ws, json!({ "type": "Watch", "data": { "view": "notes" } })).await;
    let first = next_json(&mut ws).await;
    assert_eq!(first["type"], "Snapshot");
    assert_eq!(first["data"]["view"], "notes");
    assert_eq!(first["data"]["data"]["items"]["notes"], json!([]));

    backend
        .insert_note(NewNote {
            sender: Sender::Harini,
            message: "thinking of you".into(),
            parent_id: None,
        })
        .await
        .unwrap();

    let second = next_json(&mut ws).await;
    assert_eq!(second["type"], "Snapshot");
    let notes = &second["data"]["data"]["items"]["notes"];
    assert_eq!(notes.as_array().unwrap().len(), 1);
    assert_eq!(notes[0]["message"], "thinking of you");
    assert_eq!(notes[0]["depth"], 0);

    command(&mut ws, json!({ "type": "Unwatch", "data": { "view": "notes" } })).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while backend.feed().subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("notes view still subscribed after unwatch");
}

#[tokio::test]
async fn bad_commands_are_ignored_and_disconnect_releases_views() {
    let (url, backend, _dir) = serve().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    next_json(&mut ws).await;

    command(&mut ws, json!({ "type": "Subscribe", "data": {} })).await;
    command(&mut ws, json!({ "type": "Watch", "data": { "view": "gallery" } })).await;

    let snapshot = next_json(&mut ws).await;
    assert_eq!(snapshot["data"]["view"], "gallery");
    assert_eq!(snapshot["data"]["data"]["kind"], "gallery");
    assert_eq!(backend.feed().subscriber_count(), 1);

    ws.close(None).await.unwrap();
    drop(ws);

    tokio::time::timeout(Duration::from_secs(5), async {
        while backend.feed().subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("views still subscribed after disconnect");
}
