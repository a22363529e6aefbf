use bytes::Bytes;
use httpmock::Method::{DELETE, GET, PATCH, POST};
use httpmock::MockServer;
use serde_json::json;
use uuid::Uuid;

use keepsake_store::hosted::HostedBackend;
use keepsake_store::{Backend, BackendError, Notification, SortOrder};
use keepsake_types::events::Table;
use keepsake_types::models::{NewNote, Sender};

fn note_json(id: Uuid, parent: Option<Uuid>) -> serde_json::Value {
    json!({
        "id": id,
        "sender": "harini",
        "message": "hello",
        "parent_id": parent,
        "created_at": "2024-02-14T10:00:00.000000+00:00"
    })
}

#[tokio::test]
async fn lists_notes_with_order_and_key() {
    let server = MockServer::start_async().await;
    let root = Uuid::new_v4();
    let reply = Uuid::new_v4();
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/notes")
                .query_param("select", "*")
                .query_param("order", "created_at.asc")
                .header("apikey", "anon-key")
                .header("authorization", "Bearer anon-key");
            then.status(200)
                .json_body(json!([note_json(root, None), note_json(reply, Some(root))]));
        })
        .await;

    let backend = HostedBackend::new(server.base_url(), "anon-key");
    let notes = backend.list_notes(SortOrder::Ascending).await.unwrap();

    mock.assert_async().await;
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[1].parent_id, Some(root));
    assert_eq!(notes[0].sender, Sender::Harini);
}

#[tokio::test]
async fn insert_returns_stored_row_and_notifies() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/notes")
                .header("prefer", "return=representation")
                .json_body(json!({ "sender": "harini", "message": "hello", "parent_id": null }));
            then.status(201).json_body(json!([note_json(id, None)]));
        })
        .await;

    let backend = HostedBackend::new(server.base_url(), "anon-key");
    let mut sub = backend.subscribe(&[Table::Notes]);

    let note = backend
        .insert_note(NewNote {
            sender: Sender::Harini,
            message: "hello".into(),
            parent_id: None,
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(note.id, id);
    assert!(matches!(sub.recv().await, Some(Notification::Changed(_))));
}

#[tokio::test]
async fn update_and_delete_of_missing_row_are_not_found() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    server
        .mock_async(|when, then| {
            when.method(PATCH).path("/rest/v1/notes").query_param("id", format!("eq.{}", id));
            then.status(200).json_body(json!([]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/rest/v1/notes").query_param("id", format!("eq.{}", id));
            then.status(200).json_body(json!([]));
        })
        .await;

    let backend = HostedBackend::new(server.base_url(), "anon-key");
    assert!(matches!(
        backend.update_note_message(id, "edited").await,
        Err(BackendError::NotFound(_))
    ));
    assert!(matches!(backend.delete_note(id).await, Err(BackendError::NotFound(_))));
}

#[tokio::test]
async fn upload_posts_object_without_upsert() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/storage/v1/object/photos/1700000000000-ab12cd34-us.jpg")
                .header("content-type", "image/jpeg")
                .header("x-upsert", "false")
                .body("jpeg-bytes");
            then.status(200).json_body(json!({ "Key": "photos/1700000000000-ab12cd34-us.jpg" }));
        })
        .await;

    let backend = HostedBackend::new(server.base_url(), "anon-key");
    backend
        .upload_blob(
            "photos",
            "1700000000000-ab12cd34-us.jpg",
            Bytes::from_static(b"jpeg-bytes"),
            "image/jpeg",
        )
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_surface_as_transport_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/photos");
            then.status(503).body("upstream unavailable");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/storage/v1/object/photos/dup.jpg");
            then.status(409).body("Duplicate");
        })
        .await;

    let backend = HostedBackend::new(server.base_url(), "anon-key");
    assert!(matches!(
        backend.list_photos(SortOrder::Descending).await,
        Err(BackendError::Transport(_))
    ));
    assert!(matches!(
        backend
            .upload_blob("photos", "dup.jpg", Bytes::from_static(b"x"), "image/jpeg")
            .await,
        Err(BackendError::Conflict(_))
    ));
}
