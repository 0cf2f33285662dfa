//! Vector store abstraction and backends.
//!
//! Every backend implements [`VectorStore`]: persist `{id, vector,
//! payload}` tuples, run partition-filtered ANN search, and normalize the
//! backend's native distance into a similarity in `[0, 1]`.
//!
//! # Available Implementations
//!
//! | Backend | Use Case |
//! |---------|----------|
//! | [`InMemoryStore`] | Reference semantics; tests and ephemeral runs |
//! | [`QdrantStore`] | Qdrant over HTTP/JSON with payload filters |
//! | [`RedisStore`] | Redis Stack (RediSearch) HNSW over hashes |
//!
//! The in-memory store is authoritative for contract semantics; the wire
//! backends must pass the same contract tests.

mod memory;
mod qdrant;
mod redis;

pub use memory::InMemoryStore;
pub use qdrant::QdrantStore;
pub use redis::RedisStore;

use crate::models::{MemoryItem, MemorySearchResult};
use crate::Result;

/// Trait for vector store backends.
///
/// Implementations are thread-safe (`Send + Sync`) and use interior
/// mutability; the orchestrator holds them behind `Arc<dyn VectorStore>`.
pub trait VectorStore: Send + Sync {
    /// The backend name, used in error and log context.
    fn name(&self) -> &'static str;

    /// Creates the collection if missing.
    ///
    /// Idempotent when the existing collection already declares
    /// `vector_size`. When the dimensions differ, the collection is
    /// dropped and recreated under `allow_recreation`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SchemaMismatch`] when dimensions differ and
    /// recreation is disallowed.
    fn ensure_collection_exists(&self, vector_size: usize, allow_recreation: bool) -> Result<()>;

    /// Upserts items by id.
    ///
    /// Where the backend supports it, the write is acknowledged so a
    /// subsequent [`get`](VectorStore::get) with the same id observes it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] when an item's embedding does
    /// not match the collection's declared dimension.
    fn insert(&self, items: &[MemoryItem]) -> Result<()>;

    /// Replaces the listed items; semantically delete-then-insert.
    ///
    /// Backends with native upsert may short-circuit to an upsert.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn update(&self, items: &[MemoryItem]) -> Result<()>;

    /// ANN search over the collection.
    ///
    /// When `user_id` is set, results are restricted to that partition.
    /// Returned scores are similarities in `[0, 1]`, descending.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    fn search(
        &self,
        query: &[f32],
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemorySearchResult>>;

    /// Lists up to `limit` items for the partition, newest first where
    /// feasible.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn list(&self, user_id: Option<&str>, limit: usize) -> Result<Vec<MemoryItem>>;

    /// Fetches one item, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails; a missing id is not an error.
    fn get(&self, id: &str) -> Result<Option<MemoryItem>>;

    /// Removes one item by id. Removing an absent id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn delete(&self, id: &str) -> Result<()>;

    /// Removes every item in the user's partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn delete_by_user(&self, user_id: &str) -> Result<()>;
}

/// Cosine similarity between two vectors.
///
/// Returns 0 when the vectors differ in length or either magnitude is 0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Converts a cosine distance into a clamped similarity.
#[must_use]
pub fn distance_to_similarity(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Clamps a native similarity into the `[0, 1]` contract range.
#[must_use]
pub fn clamp_similarity(similarity: f32) -> f32 {
    similarity.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_magnitude() {
        assert!((cosine_similarity(&[0.0, 0.0], &[1.0, 0.0])).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cosine_length_mismatch() {
        assert!((cosine_similarity(&[1.0], &[1.0, 0.0])).abs() < f32::EPSILON);
    }

    #[test]
    fn test_distance_to_similarity_bounds() {
        assert!((distance_to_similarity(0.0) - 1.0).abs() < f32::EPSILON);
        assert!((distance_to_similarity(1.0)).abs() < f32::EPSILON);
        // A distance past 1 (opposed vectors) clamps rather than going negative.
        assert!((distance_to_similarity(1.7)).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clamp_similarity() {
        assert!((clamp_similarity(1.2) - 1.0).abs() < f32::EPSILON);
        assert!((clamp_similarity(-0.3)).abs() < f32::EPSILON);
        assert!((clamp_similarity(0.5) - 0.5).abs() < f32::EPSILON);
    }
}
