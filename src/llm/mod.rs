//! LLM client abstraction.
//!
//! Three prompt-driven operations sit on top of a single completion
//! primitive: statement extraction, duplicate merging, and result
//! reranking. Extraction and reranking parse model JSON leniently and
//! degrade on parse failure — an unparseable extraction yields no
//! memories and an unparseable rerank keeps the store's order. These are
//! expected model-quality failures, not system failures.

mod openai;
pub mod prompts;

pub use openai::OpenAiClient;

use crate::models::{ExtractedMemory, MemorySearchResult};
use crate::Result;
use serde::Deserialize;
use std::fmt::Write as _;

/// Trait for LLM providers.
///
/// Implementors supply [`complete`](LlmProvider::complete); the three
/// memory operations are provided on top of it and share their prompt and
/// parsing behavior across providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Extracts atomic factual statements from a conversation transcript.
    ///
    /// Returns an empty list when the model's answer cannot be parsed;
    /// extraction order is preserved.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    fn extract_memories(&self, conversation: &str) -> Result<Vec<ExtractedMemory>> {
        let response = self.complete(&prompts::fact_extraction(conversation))?;
        Ok(parse_extraction(&response))
    }

    /// Merges a new statement into an existing memory, returning the
    /// merged text.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn merge_memories(&self, existing: &str, new: &str) -> Result<String> {
        let response = self.complete(&prompts::merge_memories(existing, new))?;
        Ok(response.trim().trim_matches('"').to_string())
    }

    /// Reorders search results by relevance to the query.
    ///
    /// The model's order is authoritative; out-of-range indices are
    /// filtered and omitted results are dropped. When the answer cannot be
    /// parsed the input order is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    fn rerank(
        &self,
        query: &str,
        results: Vec<MemorySearchResult>,
    ) -> Result<Vec<MemorySearchResult>> {
        if results.is_empty() {
            return Ok(results);
        }

        let mut candidates = String::new();
        for (i, result) in results.iter().enumerate() {
            let _ = writeln!(candidates, "{i}. {}", result.memory.data);
        }

        let response = self.complete(&prompts::rerank_results(query, candidates.trim_end()))?;
        match parse_ranked_indices(&response, results.len()) {
            Some(indices) => Ok(reorder(results, &indices)),
            None => {
                tracing::warn!(provider = self.name(), "unparseable rerank response, keeping store order");
                Ok(results)
            },
        }
    }
}

/// Parses the extractor's `{"memories":[...]}` answer.
///
/// Tolerates a fenced code block or prose around the JSON object. Returns
/// an empty list on any parse failure.
#[must_use]
pub fn parse_extraction(response: &str) -> Vec<ExtractedMemory> {
    #[derive(Deserialize)]
    struct Extraction {
        memories: Vec<ExtractedMemory>,
    }

    let Some(json) = carve_json_object(response) else {
        tracing::warn!("extraction response contains no JSON object");
        return Vec::new();
    };

    match serde_json::from_str::<Extraction>(json) {
        Ok(extraction) => extraction
            .memories
            .into_iter()
            .filter(|m| !m.data.trim().is_empty())
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse extraction response");
            Vec::new()
        },
    }
}

/// Parses the reranker's `{"ranked_indices":[...]}` answer.
///
/// Filters indices outside `0..len` and duplicate references (first
/// occurrence wins). Returns `None` when the answer cannot be parsed.
#[must_use]
pub fn parse_ranked_indices(response: &str, len: usize) -> Option<Vec<usize>> {
    #[derive(Deserialize)]
    struct Ranking {
        ranked_indices: Vec<usize>,
    }

    let json = carve_json_object(response)?;
    let ranking: Ranking = serde_json::from_str(json).ok()?;

    let mut seen = vec![false; len];
    let mut indices = Vec::with_capacity(ranking.ranked_indices.len());
    for index in ranking.ranked_indices {
        if index < len && !seen[index] {
            seen[index] = true;
            indices.push(index);
        }
    }
    Some(indices)
}

/// Reorders `results` by the given positions, dropping everything the
/// ranking omitted.
fn reorder(results: Vec<MemorySearchResult>, indices: &[usize]) -> Vec<MemorySearchResult> {
    let mut slots: Vec<Option<MemorySearchResult>> = results.into_iter().map(Some).collect();
    indices
        .iter()
        .filter_map(|&i| slots[i].take())
        .collect()
}

/// Locates the outermost JSON object in a model answer, stripping fenced
/// code blocks and surrounding prose.
fn carve_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&response[start..=end])
}
