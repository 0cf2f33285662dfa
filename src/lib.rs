//! # MemNet
//!
//! A long-term memory layer for conversational AI applications.
//!
//! MemNet ingests unstructured message transcripts, distills them into
//! atomic factual statements with an LLM, stores each statement alongside a
//! dense vector embedding in a pluggable vector database, and later
//! retrieves the statements most semantically relevant to a query. The
//! layer itself is stateless across restarts; everything durable lives in
//! the external vector store.
//!
//! ## Architecture
//!
//! - [`MemoryService`] orchestrates the add/search/update pipeline
//! - [`Embedder`] turns text into dense vectors and reports its native
//!   dimension
//! - [`LlmProvider`] drives the three prompt operations: extract, merge,
//!   rerank
//! - [`VectorStore`] abstracts the backing store; shipped backends are an
//!   in-memory reference, Qdrant over HTTP, and Redis Stack (RediSearch)
//!
//! ## Example
//!
//! ```rust,ignore
//! use memnet::{AddMemoryRequest, MemNetConfig, MemoryService, Message, Role};
//!
//! let config = MemNetConfig::from_file("memnet.json")?;
//! let service = MemoryService::from_config(&config)?;
//! service.initialize(false)?;
//!
//! service.add(AddMemoryRequest {
//!     messages: vec![Message::new(Role::User, "My name is Zack. I love programming.")],
//!     user_id: Some("u1".to_string()),
//!     ..Default::default()
//! })?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use std::error::Error as StdError;
use std::fmt;

// Module declarations
pub mod config;
pub mod embedding;
pub mod llm;
pub mod models;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{EmbedderConfig, LlmConfig, MemNetConfig, VectorStoreConfig};
pub use embedding::{Embedder, OpenAiEmbedder};
pub use llm::{LlmProvider, OpenAiClient};
pub use models::{
    AddMemoryRequest, AddMemoryResponse, AddedMemory, ExtractedMemory, MemoryEvent, MemoryItem,
    MemorySearchResult, Message, Role, SearchMemoryRequest,
};
pub use services::MemoryService;
pub use storage::{InMemoryStore, QdrantStore, RedisStore, VectorStore};

/// Error type for memnet operations.
#[derive(Debug)]
pub enum Error {
    /// Configuration is missing or contradictory.
    Configuration(String),
    /// A collection exists with a different vector dimension and
    /// recreation was not allowed.
    SchemaMismatch {
        /// The collection or index name.
        collection: String,
        /// The dimension requested by the caller.
        expected: usize,
        /// The dimension the existing collection declares.
        actual: usize,
    },
    /// A transport-level failure reaching the embedder, LLM, or store.
    BackendUnavailable {
        /// The backend that could not be reached.
        backend: String,
        /// The underlying cause.
        cause: String,
    },
    /// A remote backend answered with a non-success status or a body that
    /// could not be interpreted.
    Protocol {
        /// The backend that produced the response.
        backend: String,
        /// HTTP status code, or 0 for non-HTTP protocols.
        status: u16,
        /// The response body or protocol error text.
        body: String,
    },
    /// Invalid input was provided.
    Validation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::SchemaMismatch {
                collection,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "collection '{collection}' declares dimension {actual}, requested {expected} \
                     (pass allow_recreation to drop and recreate)"
                )
            },
            Self::BackendUnavailable { backend, cause } => {
                write!(f, "backend '{backend}' unavailable: {cause}")
            },
            Self::Protocol {
                backend,
                status,
                body,
            } => {
                write!(f, "backend '{backend}' returned status {status}: {body}")
            },
            Self::Validation(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl StdError for Error {}

/// Result type alias for memnet operations.
pub type Result<T> = std::result::Result<T, Error>;
