//! In-memory reference store.
//!
//! Authoritative for the [`VectorStore`] contract: every other backend
//! must behave the way this one does. A single coarse mutex covers the map
//! and the declared dimension, so every operation observes a consistent
//! snapshot. Not persistent.

use super::{clamp_similarity, cosine_similarity, VectorStore};
use crate::models::{MemoryItem, MemorySearchResult};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Map-backed store used as the behavioral reference and in tests.
pub struct InMemoryStore {
    state: Mutex<State>,
}

struct State {
    items: HashMap<String, MemoryItem>,
    /// Dimension declared by `ensure_collection_exists`; `None` until the
    /// collection is initialized.
    vector_size: Option<usize>,
}

impl InMemoryStore {
    /// Creates an empty store with no declared collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: HashMap::new(),
                vector_size: None,
            }),
        }
    }

    /// Returns the number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns whether the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock means a panic mid-mutation; the map holds plain
        // data, so continuing with it is sound.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_dimension(state: &State, items: &[MemoryItem]) -> Result<()> {
        for item in items {
            if item.embedding.is_empty() {
                return Err(Error::Validation(format!(
                    "memory '{}' has an empty embedding",
                    item.id
                )));
            }
            if let Some(size) = state.vector_size {
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
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn ensure_collection_exists(&self, vector_size: usize, allow_recreation: bool) -> Result<()> {
        let mut state = self.lock();
        match state.vector_size {
            Some(existing) if existing != vector_size => {
                if !allow_recreation {
                    return Err(Error::SchemaMismatch {
                        collection: "in-memory".to_string(),
                        expected: vector_size,
                        actual: existing,
                    });
                }
                tracing::info!(
                    old_dimensions = existing,
                    new_dimensions = vector_size,
                    "recreating in-memory collection"
                );
                state.items.clear();
                state.vector_size = Some(vector_size);
            },
            _ => state.vector_size = Some(vector_size),
        }
        Ok(())
    }

    fn insert(&self, items: &[MemoryItem]) -> Result<()> {
        let mut state = self.lock();
        Self::check_dimension(&state, items)?;
        for item in items {
            state.items.insert(item.id.clone(), item.clone());
        }
        Ok(())
    }

    fn update(&self, items: &[MemoryItem]) -> Result<()> {
        // Upsert by id is already delete-then-insert for a map.
        self.insert(items)
    }

    fn search(
        &self,
        query: &[f32],
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemorySearchResult>> {
        let state = self.lock();
        let mut results: Vec<MemorySearchResult> = state
            .items
            .values()
            .filter(|item| match user_id {
                Some(user) => item.user_id.as_deref() == Some(user),
                None => true,
            })
            .map(|item| MemorySearchResult {
                score: clamp_similarity(cosine_similarity(query, &item.embedding)),
                memory: item.clone(),
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }

    fn list(&self, user_id: Option<&str>, limit: usize) -> Result<Vec<MemoryItem>> {
        let state = self.lock();
        let mut items: Vec<MemoryItem> = state
            .items
            .values()
            .filter(|item| match user_id {
                Some(user) => item.user_id.as_deref() == Some(user),
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit);
        Ok(items)
    }

    fn get(&self, id: &str) -> Result<Option<MemoryItem>> {
        Ok(self.lock().items.get(id).cloned())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.lock().items.remove(id);
        Ok(())
    }

    fn delete_by_user(&self, user_id: &str) -> Result<()> {
        self.lock()
            .items
            .retain(|_, item| item.user_id.as_deref() != Some(user_id));
        Ok(())
    }
}
