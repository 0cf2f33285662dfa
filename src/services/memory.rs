//! Memory lifecycle orchestration.
//!
//! Couples the extractor, the embedder, the vector store, the duplicate
//! consolidation policy, and the optional reranker into one service. The
//! service holds no per-request state; every operation is a sequential
//! pipeline over the injected collaborators.

use crate::config::MemNetConfig;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::llm::{LlmProvider, OpenAiClient};
use crate::models::{
    AddMemoryRequest, AddMemoryResponse, AddedMemory, MemoryEvent, MemoryItem, MemorySearchResult,
    SearchMemoryRequest,
};
use crate::storage::{QdrantStore, RedisStore, VectorStore};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// How many neighbors the duplicate probe inspects per candidate.
const PROBE_LIMIT: usize = 5;

/// Orchestrates the add/search/update pipeline over an embedder, an LLM
/// provider, and a vector store.
///
/// # Consistency
///
/// [`add`](Self::add) flushes inserts and updates as two separate store
/// calls with no transaction; a failure in between leaves the inserts
/// durable and the updates unapplied. Concurrent adds for the same user
/// may race, so duplicate detection is best-effort across requests.
pub struct MemoryService {
    /// Embedding generator.
    embedder: Arc<dyn Embedder>,
    /// LLM provider for extract, merge, and rerank.
    llm: Arc<dyn LlmProvider>,
    /// Backing vector store.
    store: Arc<dyn VectorStore>,
    /// Similarity cut-off for the merge branch; strictly greater wins.
    duplicate_threshold: f32,
    /// Whether search results pass through the LLM reranker.
    enable_reranking: bool,
}

impl MemoryService {
    /// Creates a service over the given collaborators with default policy
    /// (threshold 0.6, reranking on).
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            embedder,
            llm,
            store,
            duplicate_threshold: MemNetConfig::DEFAULT_DUPLICATE_THRESHOLD,
            enable_reranking: true,
        }
    }

    /// Sets the duplicate threshold (similarity, clamped to `[0, 1]`).
    #[must_use]
    pub fn with_duplicate_threshold(mut self, threshold: f32) -> Self {
        self.duplicate_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Enables or disables the rerank pass.
    #[must_use]
    pub const fn with_reranking(mut self, enabled: bool) -> Self {
        self.enable_reranking = enabled;
        self
    }

    /// Wires the standard OpenAI-compatible providers and a store chosen
    /// by the endpoint scheme: `redis://` selects the Redis backend,
    /// anything else the Qdrant backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when required options are missing.
    pub fn from_config(config: &MemNetConfig) -> Result<Self> {
        config.validate()?;

        let embedder_config = &config.embedder;
        let mut embedder = OpenAiEmbedder::new(
            embedder_config.endpoint.clone().unwrap_or_default(),
            embedder_config.model.clone().unwrap_or_default(),
        );
        if let Some(key) = &embedder_config.api_key {
            embedder = embedder.with_api_key(key.clone());
        }

        let llm_config = &config.llm;
        let mut llm = OpenAiClient::new(
            llm_config.endpoint.clone().unwrap_or_default(),
            llm_config.model.clone().unwrap_or_default(),
        );
        if let Some(key) = &llm_config.api_key {
            llm = llm.with_api_key(key.clone());
        }

        let store_config = &config.vector_store;
        let endpoint = store_config.endpoint.clone().unwrap_or_default();
        let store: Arc<dyn VectorStore> =
            if endpoint.starts_with("redis://") || endpoint.starts_with("rediss://") {
                Arc::new(RedisStore::new(
                    endpoint,
                    store_config.collection_name.clone(),
                    store_config.api_key.as_deref(),
                )?)
            } else {
                let mut qdrant = QdrantStore::new(endpoint, store_config.collection_name.clone());
                if let Some(key) = &store_config.api_key {
                    qdrant = qdrant.with_api_key(key.clone());
                }
                Arc::new(qdrant)
            };

        Ok(Self::new(Arc::new(embedder), Arc::new(llm), store)
            .with_duplicate_threshold(config.duplicate_threshold)
            .with_reranking(config.enable_reranking))
    }

    /// Detects the embedder's native dimension and declares the
    /// collection. Must complete before any other operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] when the collection exists with a
    /// different dimension and `allow_recreation` is false.
    #[instrument(skip(self), fields(operation = "initialize"))]
    pub fn initialize(&self, allow_recreation: bool) -> Result<()> {
        let start = Instant::now();
        let result = self.embedder.vector_size().and_then(|size| {
            tracing::info!(store = self.store.name(), dimensions = size, "initializing collection");
            self.store.ensure_collection_exists(size, allow_recreation)
        });
        record_operation("initialize", &result, start);
        result
    }

    /// Distills the transcript into statements and writes each one as a
    /// fresh memory or a merge into its duplicate.
    ///
    /// Returns one entry per extracted statement, in extraction order. An
    /// extraction the model could not phrase as JSON yields an empty
    /// response and writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty message list; embedder,
    /// LLM transport, and store errors propagate.
    #[instrument(skip(self, request), fields(operation = "add", user_id = request.user_id.as_deref().unwrap_or("")))]
    pub fn add(&self, request: AddMemoryRequest) -> Result<AddMemoryResponse> {
        let start = Instant::now();
        let result = self.add_inner(request);
        record_operation("add", &result, start);
        result
    }

    fn add_inner(&self, request: AddMemoryRequest) -> Result<AddMemoryResponse> {
        if request.messages.is_empty() {
            return Err(Error::Validation("message list is empty".to_string()));
        }

        let transcript = render_transcript(&request);
        let statements = self.llm.extract_memories(&transcript)?;
        if statements.is_empty() {
            tracing::info!("extractor produced no statements");
            return Ok(AddMemoryResponse::default());
        }
        tracing::debug!(count = statements.len(), "extracted candidate statements");

        let mut inserts: Vec<MemoryItem> = Vec::new();
        let mut updates: Vec<MemoryItem> = Vec::new();
        let mut results = Vec::with_capacity(statements.len());

        for statement in &statements {
            let embedding = self.embedder.embed(&statement.data)?;
            let probe = self
                .store
                .search(&embedding, request.user_id.as_deref(), PROBE_LIMIT)?;

            let duplicate = probe
                .into_iter()
                .find(|hit| hit.score > self.duplicate_threshold);

            if let Some(hit) = duplicate {
                // A candidate earlier in this batch may already have
                // merged into the same record; chain onto its pending
                // text so the first merge is not lost.
                let pending = updates.iter().position(|item| item.id == hit.memory.id);
                let existing_data = pending.map_or_else(
                    || hit.memory.data.clone(),
                    |index| updates[index].data.clone(),
                );

                let merged = self.llm.merge_memories(&existing_data, &statement.data)?;
                tracing::debug!(
                    memory_id = %hit.memory.id,
                    score = hit.score,
                    "merging statement into existing memory"
                );

                let mut item = hit.memory;
                item.data.clone_from(&merged);
                item.embedding = self.embedder.embed(&merged)?;
                item.updated_at = Some(Utc::now());

                match pending {
                    Some(index) => updates[index] = item.clone(),
                    None => updates.push(item.clone()),
                }
                results.push(AddedMemory {
                    id: item.id,
                    memory: merged,
                    event: MemoryEvent::Update,
                });
            } else {
                let item = MemoryItem::new(statement.data.clone(), embedding)
                    .with_partition(
                        request.user_id.clone(),
                        request.agent_id.clone(),
                        request.run_id.clone(),
                    )
                    .with_metadata(request.metadata.clone());
                results.push(AddedMemory {
                    id: item.id.clone(),
                    memory: item.data.clone(),
                    event: MemoryEvent::Add,
                });
                inserts.push(item);
            }
        }

        // Two separate flushes, no transaction: a failure here leaves the
        // inserts durable and the updates unapplied.
        if !inserts.is_empty() {
            self.store.insert(&inserts)?;
        }
        if !updates.is_empty() {
            self.store.update(&updates)?;
        }

        tracing::info!(
            added = inserts.len(),
            updated = updates.len(),
            "add pipeline complete"
        );
        Ok(AddMemoryResponse { results })
    }

    /// Embeds the query, searches the caller's partition, and optionally
    /// reranks with the LLM. The reranker's order is authoritative; an
    /// unparseable rerank answer keeps the store's order.
    ///
    /// # Errors
    ///
    /// Returns an error when embedding, the store, or LLM transport fails.
    #[instrument(skip(self, request), fields(operation = "search", user_id = request.user_id.as_deref().unwrap_or("")))]
    pub fn search(&self, request: &SearchMemoryRequest) -> Result<Vec<MemorySearchResult>> {
        let start = Instant::now();
        let result = self.search_inner(request);
        record_operation("search", &result, start);
        result
    }

    fn search_inner(&self, request: &SearchMemoryRequest) -> Result<Vec<MemorySearchResult>> {
        let query_vec = self.embedder.embed(&request.query)?;
        let results = self
            .store
            .search(&query_vec, request.user_id.as_deref(), request.limit)?;

        if !self.enable_reranking || results.is_empty() {
            return Ok(results);
        }
        self.llm.rerank(&request.query, results)
    }

    /// Lists up to `limit` memories in the partition, newest first where
    /// the backend supports ordering.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_all(&self, user_id: Option<&str>, limit: usize) -> Result<Vec<MemoryItem>> {
        self.store.list(user_id, limit)
    }

    /// Fetches one memory, or `None` when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get(&self, id: &str) -> Result<Option<MemoryItem>> {
        self.store.get(id)
    }

    /// Replaces a memory's text, re-embedding it and stamping
    /// `updated_at`. Returns `false` when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty content; embedder and store
    /// errors propagate.
    #[instrument(skip(self, content), fields(operation = "update", memory_id = id))]
    pub fn update(&self, id: &str, content: &str) -> Result<bool> {
        let start = Instant::now();
        let result = self.update_inner(id, content);
        record_operation("update", &result, start);
        result
    }

    fn update_inner(&self, id: &str, content: &str) -> Result<bool> {
        if content.trim().is_empty() {
            return Err(Error::Validation("memory content is empty".to_string()));
        }
        let Some(mut item) = self.store.get(id)? else {
            return Ok(false);
        };
        item.data = content.to_string();
        item.embedding = self.embedder.embed(content)?;
        item.updated_at = Some(Utc::now());
        self.store.update(std::slice::from_ref(&item))?;
        Ok(true)
    }

    /// Removes one memory. Removing an unknown id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }

    /// Removes every memory in the user's partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn delete_all(&self, user_id: &str) -> Result<()> {
        self.store.delete_by_user(user_id)
    }
}

/// Joins the request messages into one role-tagged text block.
fn render_transcript(request: &AddMemoryRequest) -> String {
    let mut transcript = String::new();
    for message in &request.messages {
        transcript.push_str(message.role.as_str());
        transcript.push_str(": ");
        transcript.push_str(&message.content);
        transcript.push('\n');
    }
    transcript
}

/// Records the operation counter and latency histogram.
fn record_operation<T>(operation: &'static str, result: &Result<T>, start: Instant) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!(
        "memory_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "memory_operation_duration_ms",
        "operation" => operation
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
