//! Qdrant backend integration tests.
//!
//! Requires a running Qdrant instance. Set `MEMNET_TEST_QDRANT_URL` to
//! enable:
//!
//! ```bash
//! export MEMNET_TEST_QDRANT_URL="http://localhost:6333"
//! cargo test --test qdrant_integration
//! ```
//!
//! The suite is the same store contract the in-memory reference passes.
//! Qdrant requires UUID-shaped point ids, so fixtures re-key the contract
//! items before writing.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use memnet::{Error, MemoryItem, QdrantStore, VectorStore};
use std::env;

const QDRANT_URL_ENV: &str = "MEMNET_TEST_QDRANT_URL";

fn qdrant_url() -> Option<String> {
    env::var(QDRANT_URL_ENV).ok()
}

/// Skips the test silently when no Qdrant endpoint is configured.
macro_rules! require_qdrant {
    () => {
        match qdrant_url() {
            Some(url) => url,
            None => {
                eprintln!("skipping: {QDRANT_URL_ENV} not set");
                return;
            },
        }
    };
}

fn fresh_store(url: &str, suffix: &str) -> QdrantStore {
    let store = QdrantStore::new(url, format!("memnet_test_{suffix}"));
    // Start from a clean collection regardless of prior runs.
    store
        .ensure_collection_exists(common::DIMENSIONS, true)
        .expect("collection");
    store
}

fn uuid_item(user: &str, data: &str, embedding: Vec<f32>) -> MemoryItem {
    let mut item = MemoryItem::new(data, embedding);
    item.user_id = Some(user.to_string());
    item
}

#[test]
fn qdrant_roundtrip_and_partition() {
    let url = require_qdrant!();
    let store = fresh_store(&url, "roundtrip");

    let mine = uuid_item("u1", "u1 memory", vec![1.0, 0.0, 0.0, 0.0]);
    let theirs = uuid_item("u2", "u2 memory", vec![1.0, 0.0, 0.0, 0.0]);
    store
        .insert(&[mine.clone(), theirs.clone()])
        .expect("insert");

    let fetched = store.get(&mine.id).expect("get").expect("present");
    assert_eq!(fetched.data, mine.data);
    assert_eq!(fetched.user_id, mine.user_id);
    assert_eq!(
        fetched.created_at.timestamp_millis(),
        mine.created_at.timestamp_millis()
    );

    let hits = store
        .search(&[1.0, 0.0, 0.0, 0.0], Some("u1"), 10)
        .expect("search");
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|hit| hit.memory.user_id.as_deref() == Some("u1")));
    for hit in &hits {
        assert!((0.0..=1.0).contains(&hit.score));
    }
}

#[test]
fn qdrant_update_and_delete() {
    let url = require_qdrant!();
    let store = fresh_store(&url, "update");

    let item = uuid_item("u1", "original", vec![0.0, 1.0, 0.0, 0.0]);
    store.insert(std::slice::from_ref(&item)).expect("insert");

    let mut revised = item.clone();
    revised.data = "revised".to_string();
    revised.updated_at = Some(chrono::Utc::now());
    store.update(std::slice::from_ref(&revised)).expect("update");

    let fetched = store.get(&item.id).expect("get").expect("present");
    assert_eq!(fetched.data, "revised");
    assert!(fetched.updated_at.expect("updated_at") > fetched.created_at);

    store.delete(&item.id).expect("delete");
    assert!(store.get(&item.id).expect("get").is_none());

    let other = uuid_item("wipe-user", "to wipe", vec![0.0, 0.0, 1.0, 0.0]);
    store.insert(std::slice::from_ref(&other)).expect("insert");
    store.delete_by_user("wipe-user").expect("delete by user");
    assert!(store.get(&other.id).expect("get").is_none());
}

#[test]
fn qdrant_dimension_guard() {
    let url = require_qdrant!();
    let store = fresh_store(&url, "dimension");

    let refused = store.ensure_collection_exists(common::DIMENSIONS * 2, false);
    assert!(matches!(refused, Err(Error::SchemaMismatch { .. })));

    store
        .ensure_collection_exists(common::DIMENSIONS * 2, true)
        .expect("recreate");
    assert!(store.list(None, 10).expect("list").is_empty());
}

#[test]
fn qdrant_list_newest_first() {
    let url = require_qdrant!();
    let store = fresh_store(&url, "list");

    let mut old = uuid_item("u1", "older", vec![1.0, 0.0, 0.0, 0.0]);
    old.created_at = chrono::Utc::now() - chrono::Duration::hours(2);
    let new = uuid_item("u1", "newer", vec![0.0, 1.0, 0.0, 0.0]);
    store.insert(&[old, new]).expect("insert");

    let listed = store.list(Some("u1"), 10).expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].data, "newer");
}
