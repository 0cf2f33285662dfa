//! Qdrant vector store backend.
//!
//! Thin translator between the [`VectorStore`] contract and the Qdrant
//! HTTP API. One point per memory; partition keys and attributes travel in
//! the point payload, so the partition filter is a structured payload
//! `must` clause rather than interpolated query text.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | Probe / create | `GET` / `PUT /collections/{name}` |
//! | Upsert | `PUT /collections/{name}/points?wait=true` |
//! | Search | `POST /collections/{name}/points/search` |
//! | List | `POST /collections/{name}/points/scroll` |
//! | Get | `GET /collections/{name}/points/{id}` |
//! | Delete | `POST /collections/{name}/points/delete?wait=true` |
//!
//! Qdrant reports cosine scores as similarity already; they pass through
//! clamped to `[0, 1]`.

use super::{clamp_similarity, VectorStore};
use crate::models::{MemoryItem, MemorySearchResult};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use std::sync::Mutex;

const BACKEND: &str = "qdrant";

/// Qdrant-backed store over the REST API.
pub struct QdrantStore {
    /// Base endpoint without trailing slash.
    endpoint: String,
    /// Collection name.
    collection: String,
    /// Optional `api-key` header value (zeroized on drop).
    api_key: Option<SecretString>,
    /// Shared blocking client; its pool is the only concurrency primitive.
    client: reqwest::blocking::Client,
    /// Dimension declared by `ensure_collection_exists`.
    vector_size: Mutex<Option<usize>>,
}

impl QdrantStore {
    /// Creates a store for the given endpoint and collection.
    ///
    /// Trailing slashes on the endpoint are trimmed once here so every
    /// request path is composed against the same canonical base.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key: None,
            client: reqwest::blocking::Client::new(),
            vector_size: Mutex::new(None),
        }
    }

    /// Sets the `api-key` header for Qdrant Cloud.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Replaces the HTTP client, e.g. to impose timeouts.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::blocking::Client) -> Self {
        self.client = client;
        self
    }

    /// Returns the collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    fn apply_auth(&self, request: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key.expose_secret()),
            None => request,
        }
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response> {
        self.apply_auth(request)
            .send()
            .map_err(|e| Error::BackendUnavailable {
                backend: BACKEND.to_string(),
                cause: e.to_string(),
            })
    }

    /// Consumes a response, returning its JSON body or a protocol error
    /// carrying status and body text.
    fn expect_json(response: reqwest::blocking::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Protocol {
                backend: BACKEND.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        response.json().map_err(|e| Error::Protocol {
            backend: BACKEND.to_string(),
            status: 0,
            body: format!("malformed response body: {e}"),
        })
    }

    /// Reads the declared vector size out of a collection-info response.
    fn parse_declared_size(info: &Value) -> Result<usize> {
        // Unnamed vector config: result.config.params.vectors.size
        info.pointer("/result/config/params/vectors/size")
            .and_then(Value::as_u64)
            .map(|size| size as usize)
            .ok_or_else(|| Error::Protocol {
                backend: BACKEND.to_string(),
                status: 0,
                body: "collection info missing vector size".to_string(),
            })
    }

    fn create_collection(&self, vector_size: usize) -> Result<()> {
        let body = json!({
            "vectors": { "size": vector_size, "distance": "Cosine" }
        });
        let response = self.send(
            self.client
                .put(self.url(&format!("collections/{}", self.collection)))
                .json(&body),
        )?;
        Self::expect_json(response)?;
        tracing::info!(collection = %self.collection, dimensions = vector_size, "created qdrant collection");
        Ok(())
    }

    fn drop_collection(&self) -> Result<()> {
        let response = self.send(
            self.client
                .delete(self.url(&format!("collections/{}", self.collection))),
        )?;
        Self::expect_json(response)?;
        Ok(())
    }

    fn upsert(&self, items: &[MemoryItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.check_dimension(items)?;

        let points: Vec<Value> = items
            .iter()
            .map(|item| {
                json!({
                    "id": item.id,
                    "vector": item.embedding,
                    "payload": payload_from_item(item),
                })
            })
            .collect();

        let response = self.send(
            self.client
                .put(self.url(&format!(
                    "collections/{}/points?wait=true",
                    self.collection
                )))
                .json(&json!({ "points": points })),
        )?;
        Self::expect_json(response)?;
        Ok(())
    }

    fn check_dimension(&self, items: &[MemoryItem]) -> Result<()> {
        let declared = *self
            .vector_size
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for item in items {
            if item.embedding.is_empty() {
                return Err(Error::Validation(format!(
                    "memory '{}' has an empty embedding",
                    item.id
                )));
            }
            if let Some(size) = declared {
                if item.embedding.len() != size {
                    return Err(Error::Validation(format!(
                        "memory '{}' has dimension {}, collection declares {}",
                        item.id,
                        item.embedding.len(),
                        size
                    )));
                }
            }
        }
        Ok(())
    }

    fn delete_by_selector(&self, selector: Value) -> Result<()> {
        let response = self.send(
            self.client
                .post(self.url(&format!(
                    "collections/{}/points/delete?wait=true",
                    self.collection
                )))
                .json(&selector),
        )?;
        Self::expect_json(response)?;
        Ok(())
    }
}

/// Builds the payload `must` filter for a partition, or `None` for an
/// unrestricted query.
fn partition_filter(user_id: Option<&str>) -> Option<Value> {
    user_id.map(|user| {
        json!({
            "must": [ { "key": "user_id", "match": { "value": user } } ]
        })
    })
}

/// Serializes a memory into the stable payload keys.
fn payload_from_item(item: &MemoryItem) -> Value {
    let mut payload = Map::new();
    payload.insert("data".to_string(), Value::String(item.data.clone()));
    if let Some(user) = &item.user_id {
        payload.insert("user_id".to_string(), Value::String(user.clone()));
    }
    if let Some(agent) = &item.agent_id {
        payload.insert("agent_id".to_string(), Value::String(agent.clone()));
    }
    if let Some(run) = &item.run_id {
        payload.insert("run_id".to_string(), Value::String(run.clone()));
    }
    if !item.metadata.is_empty() {
        payload.insert("metadata".to_string(), Value::Object(item.metadata.clone()));
    }
    if let Some(hash) = &item.hash {
        payload.insert("hash".to_string(), Value::String(hash.clone()));
    }
    payload.insert(
        "created_at".to_string(),
        Value::String(item.created_at.to_rfc3339()),
    );
    if let Some(updated) = &item.updated_at {
        payload.insert("updated_at".to_string(), Value::String(updated.to_rfc3339()));
    }
    Value::Object(payload)
}

/// Rebuilds a memory from a point's id, payload, and optional vector.
fn item_from_payload(id: String, payload: &Value, vector: Option<Vec<f32>>) -> MemoryItem {
    let field = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(ToString::to_string)
    };
    let timestamp = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
    };

    MemoryItem {
        id,
        data: field("data").unwrap_or_default(),
        embedding: vector.unwrap_or_default(),
        user_id: field("user_id"),
        agent_id: field("agent_id"),
        run_id: field("run_id"),
        metadata: payload
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        hash: field("hash"),
        created_at: timestamp("created_at").unwrap_or_else(Utc::now),
        updated_at: timestamp("updated_at"),
    }
}

fn point_id(value: &Value) -> String {
    match value.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn point_vector(value: &Value) -> Option<Vec<f32>> {
    value.get("vector").and_then(Value::as_array).map(|values| {
        values
            .iter()
            .filter_map(Value::as_f64)
            .map(|v| v as f32)
            .collect()
    })
}

impl VectorStore for QdrantStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn ensure_collection_exists(&self, vector_size: usize, allow_recreation: bool) -> Result<()> {
        let response = self.send(
            self.client
                .get(self.url(&format!("collections/{}", self.collection))),
        )?;

        let status = response.status();
        if status.as_u16() == 404 {
            self.create_collection(vector_size)?;
        } else {
            let info = Self::expect_json(response)?;
            let declared = Self::parse_declared_size(&info)?;
            if declared != vector_size {
                if !allow_recreation {
                    return Err(Error::SchemaMismatch {
                        collection: self.collection.clone(),
                        expected: vector_size,
                        actual: declared,
                    });
                }
                tracing::info!(
                    collection = %self.collection,
                    old_dimensions = declared,
                    new_dimensions = vector_size,
                    "recreating qdrant collection"
                );
                self.drop_collection()?;
                self.create_collection(vector_size)?;
            }
        }

        *self
            .vector_size
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(vector_size);
        Ok(())
    }

    fn insert(&self, items: &[MemoryItem]) -> Result<()> {
        self.upsert(items)
    }

    fn update(&self, items: &[MemoryItem]) -> Result<()> {
        // Qdrant point upsert replaces vector and payload wholesale, which
        // is exactly delete-then-insert for our record shape.
        self.upsert(items)
    }

    fn search(
        &self,
        query: &[f32],
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemorySearchResult>> {
        let mut body = json!({
            "vector": query,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = partition_filter(user_id) {
            body["filter"] = filter;
        }

        let response = self.send(
            self.client
                .post(self.url(&format!("collections/{}/points/search", self.collection)))
                .json(&body),
        )?;
        let parsed = Self::expect_json(response)?;

        let hits = parsed
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(hits
            .iter()
            .map(|hit| {
                let payload = hit.get("payload").cloned().unwrap_or(Value::Null);
                let score = hit
                    .get("score")
                    .and_then(Value::as_f64)
                    .unwrap_or_default() as f32;
                MemorySearchResult {
                    memory: item_from_payload(point_id(hit), &payload, None),
                    score: clamp_similarity(score),
                }
            })
            .collect())
    }

    fn list(&self, user_id: Option<&str>, limit: usize) -> Result<Vec<MemoryItem>> {
        let mut body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        if let Some(filter) = partition_filter(user_id) {
            body["filter"] = filter;
        }

        let response = self.send(
            self.client
                .post(self.url(&format!("collections/{}/points/scroll", self.collection)))
                .json(&body),
        )?;
        let parsed = Self::expect_json(response)?;

        let points = parsed
            .pointer("/result/points")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut items: Vec<MemoryItem> = points
            .iter()
            .map(|point| {
                let payload = point.get("payload").cloned().unwrap_or(Value::Null);
                item_from_payload(point_id(point), &payload, None)
            })
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit);
        Ok(items)
    }

    fn get(&self, id: &str) -> Result<Option<MemoryItem>> {
        let response = self.send(
            self.client
                .get(self.url(&format!("collections/{}/points/{id}", self.collection))),
        )?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let parsed = Self::expect_json(response)?;

        Ok(parsed.get("result").map(|point| {
            let payload = point.get("payload").cloned().unwrap_or(Value::Null);
            item_from_payload(point_id(point), &payload, point_vector(point))
        }))
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.delete_by_selector(json!({ "points": [id] }))
    }

    fn delete_by_user(&self, user_id: &str) -> Result<()> {
        let filter = partition_filter(Some(user_id)).unwrap_or(Value::Null);
        self.delete_by_selector(json!({ "filter": filter }))
    }
}
