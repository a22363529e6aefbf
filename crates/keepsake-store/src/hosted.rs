use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use keepsake_types::events::{ChangeEvent, ChangeKind, Table};
use keepsake_types::models::{Memory, NewMemory, NewNote, NewPhoto, Note, Photo};

use crate::feed::{ChangeFeed, Subscription};
use crate::{Backend, BackendError, BackendResult, SortOrder};

/// Client for a hosted row-and-object service (PostgREST rows under
/// `/rest/v1`, object storage under `/storage/v1`).
///
/// Change notifications cover writes made through this client only.
pub struct HostedBackend {
    http: Client,
    base_url: String,
    api_key: String,
    feed: ChangeFeed,
}

impl HostedBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            feed: ChangeFeed::new(),
        }
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key).bearer_auth(&self.api_key)
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, req: RequestBuilder) -> BackendResult<Vec<T>> {
        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        check(resp)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// Write rows and return what the service stored.
    async fn write_rows<T: DeserializeOwned>(&self, req: RequestBuilder) -> BackendResult<Vec<T>> {
        self.fetch_rows(req.header("Prefer", "return=representation")).await
    }

    async fn insert_one<B, T>(&self, table: Table, body: &B) -> BackendResult<T>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self
            .write_rows(self.http.post(self.table_url(table)).json(body))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode(format!("insert into {} returned no row", table.as_str())))?;
        self.changed(table, ChangeKind::Insert);
        Ok(row)
    }

    fn changed(&self, table: Table, kind: ChangeKind) {
        self.feed.publish(ChangeEvent { table, kind });
    }
}

#[async_trait]
impl Backend for HostedBackend {
    async fn list_photos(&self, order: SortOrder) -> BackendResult<Vec<Photo>> {
        let order = order_by(&["created_at"], order);
        let req = self
            .http
            .get(self.table_url(Table::Photos))
            .query(&[("select", "*"), ("order", order.as_str())]);
        self.fetch_rows(req).await
    }

    async fn insert_photo(&self, photo: NewPhoto) -> BackendResult<Photo> {
        self.insert_one(Table::Photos, &photo).await
    }

    async fn list_memories(&self, order: SortOrder) -> BackendResult<Vec<Memory>> {
        let order = order_by(&["memory_date", "created_at"], order);
        let req = self
            .http
            .get(self.table_url(Table::Memories))
            .query(&[("select", "*"), ("order", order.as_str())]);
        self.fetch_rows(req).await
    }

    async fn insert_memory(&self, memory: NewMemory) -> BackendResult<Memory> {
        self.insert_one(Table::Memories, &memory).await
    }

    async fn list_notes(&self, order: SortOrder) -> BackendResult<Vec<Note>> {
        let order = order_by(&["created_at"], order);
        let req = self
            .http
            .get(self.table_url(Table::Notes))
            .query(&[("select", "*"), ("order", order.as_str())]);
        self.fetch_rows(req).await
    }

    async fn get_note(&self, id: Uuid) -> BackendResult<Option<Note>> {
        let req = self
            .http
            .get(self.table_url(Table::Notes))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]);
        let rows: Vec<Note> = self.fetch_rows(req).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_note(&self, note: NewNote) -> BackendResult<Note> {
        self.insert_one(Table::Notes, &note).await
    }

    async fn update_note_message(&self, id: Uuid, message: &str) -> BackendResult<Note> {
        let req = self
            .http
            .patch(self.table_url(Table::Notes))
            .query(&[("id", format!("eq.{}", id))])
            .json(&json!({ "message": message }));
        let rows: Vec<Note> = self.write_rows(req).await?;
        let note = rows
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("note {}", id)))?;
        self.changed(Table::Notes, ChangeKind::Update);
        Ok(note)
    }

    async fn delete_note(&self, id: Uuid) -> BackendResult<()> {
        let req = self
            .http
            .delete(self.table_url(Table::Notes))
            .query(&[("id", format!("eq.{}", id))]);
        let rows: Vec<serde_json::Value> = self.write_rows(req).await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound(format!("note {}", id)));
        }
        self.changed(Table::Notes, ChangeKind::Delete);
        Ok(())
    }

    async fn upload_blob(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> BackendResult<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        let size = bytes.len();
        let resp = self
            .authorized(self.http.post(&url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CACHE_CONTROL, "3600")
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| BackendError::Storage(e.to_string()))?;
        check(resp).await?;
        debug!("Uploaded {} bytes to {}/{}", size, bucket, path);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }

    fn subscribe(&self, tables: &[Table]) -> Subscription {
        self.feed.subscribe(tables)
    }
}

/// PostgREST order clause, e.g. `memory_date.desc,created_at.desc`.
fn order_by(columns: &[&str], order: SortOrder) -> String {
    let dir = match order {
        SortOrder::Ascending => "asc",
        SortOrder::Descending => "desc",
    };
    columns
        .iter()
        .map(|c| format!("{}.{}", c, dir))
        .collect::<Vec<_>>()
        .join(",")
}

async fn check(resp: Response) -> BackendResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let detail = format!("{} {}", status, body.chars().take(200).collect::<String>());
    warn!("Hosted backend returned {}", detail);

    Err(match status {
        StatusCode::NOT_FOUND => BackendError::NotFound(detail),
        StatusCode::CONFLICT => BackendError::Conflict(detail),
        _ => BackendError::Transport(detail),
    })
}
