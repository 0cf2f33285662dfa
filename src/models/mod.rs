//! Core data types for memories, messages, and service requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant.
    Assistant,
    /// A system message.
    System,
}

impl Role {
    /// Returns the role as a lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation message handed to [`add`](crate::MemoryService::add).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who said it.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl Message {
    /// Creates a new message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The unit of persisted memory: one atomic factual statement plus its
/// embedding and partition keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Opaque stable identifier, unique within a collection.
    pub id: String,
    /// The atomic statement text. Never empty.
    pub data: String,
    /// Dense vector; length always equals the collection's declared
    /// dimension. May be empty on items returned from search or list.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Partition key: owning user.
    pub user_id: Option<String>,
    /// Partition key: owning agent.
    pub agent_id: Option<String>,
    /// Partition key: owning run.
    pub run_id: Option<String>,
    /// Arbitrary attribute bag.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Content fingerprint, reserved for exact-duplicate short-circuit.
    pub hash: Option<String>,
    /// Set once at first insertion.
    pub created_at: DateTime<Utc>,
    /// Set on every mutation after creation; absent until the first update.
    pub updated_at: Option<DateTime<Utc>>,
}

impl MemoryItem {
    /// Creates a fresh memory with a new v4 UUID and `created_at = now`.
    #[must_use]
    pub fn new(data: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            data: data.into(),
            embedding,
            user_id: None,
            agent_id: None,
            run_id: None,
            metadata: Map::new(),
            hash: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Sets the partition keys.
    #[must_use]
    pub fn with_partition(
        mut self,
        user_id: Option<String>,
        agent_id: Option<String>,
        run_id: Option<String>,
    ) -> Self {
        self.user_id = user_id;
        self.agent_id = agent_id;
        self.run_id = run_id;
        self
    }

    /// Sets the metadata bag.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A search hit: a memory joined with its similarity to the query.
///
/// `score` is a similarity in `[0, 1]` where 1 means most similar. The
/// memory's embedding is not required to be populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySearchResult {
    /// The matched memory.
    pub memory: MemoryItem,
    /// Similarity to the query, higher is better.
    pub score: f32,
}

/// A single statement produced by the LLM extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMemory {
    /// The standalone factual statement.
    pub data: String,
}

/// What the add pipeline did with one extracted statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryEvent {
    /// A fresh memory was inserted.
    Add,
    /// An existing memory absorbed the statement via merge.
    Update,
}

impl MemoryEvent {
    /// Returns the event tag as a lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for MemoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request for [`add`](crate::MemoryService::add).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddMemoryRequest {
    /// The transcript to distill. Must not be empty.
    pub messages: Vec<Message>,
    /// Partition key: owning user.
    pub user_id: Option<String>,
    /// Partition key: owning agent.
    pub agent_id: Option<String>,
    /// Partition key: owning run.
    pub run_id: Option<String>,
    /// Attributes attached to every memory written by this call.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// One affected memory in an [`AddMemoryResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddedMemory {
    /// Final id of the affected memory.
    pub id: String,
    /// Final statement text after any merge.
    pub memory: String,
    /// Whether the statement was inserted or merged into an existing one.
    pub event: MemoryEvent,
}

/// Response from [`add`](crate::MemoryService::add).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddMemoryResponse {
    /// One entry per extracted statement, in extraction order.
    pub results: Vec<AddedMemory>,
}

/// Request for [`search`](crate::MemoryService::search).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMemoryRequest {
    /// Free-text query.
    pub query: String,
    /// Restrict results to this user's partition.
    pub user_id: Option<String>,
    /// Maximum number of results.
    pub limit: usize,
}

impl SearchMemoryRequest {
    /// Creates a request with the default limit of 100.
    pub fn new(query: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            query: query.into(),
            user_id,
            limit: 100,
        }
    }
}

impl Default for SearchMemoryRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            user_id: None,
            limit: 100,
        }
    }
}
