//! Embedding generation.
//!
//! Turns text into dense float vectors for similarity search. The native
//! vector dimension is not configured; it is detected by embedding a
//! sentinel string once and caching the length, so the store can be
//! initialized with whatever the model actually produces.

mod openai;

pub use openai::OpenAiEmbedder;

use crate::Result;

/// Sentinel string embedded once to detect the model's native dimension.
pub const DIMENSION_PROBE: &str = "test";

/// Trait for embedding generators.
///
/// Implementations must be thread-safe (`Send + Sync`). Output vectors are
/// L2-normalized when the downstream metric is COSINE; remote providers
/// typically do this implicitly.
pub trait Embedder: Send + Sync {
    /// Returns the model's native vector dimension.
    ///
    /// Detected on first call by embedding [`DIMENSION_PROBE`] and cached
    /// per instance. Must complete before the vector store is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe embedding fails.
    fn vector_size(&self) -> Result<usize>;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] for empty input; transient
    /// network failures propagate.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}
