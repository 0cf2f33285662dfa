//! Redis backend integration tests.
//!
//! Requires a running Redis Stack (or Redis with the RediSearch 2.4+
//! module). Set `MEMNET_TEST_REDIS_URL` to enable:
//!
//! ```bash
//! export MEMNET_TEST_REDIS_URL="redis://localhost:6379"
//! cargo test --test redis_integration
//! ```
//!
//! The suite is the same store contract the in-memory reference passes.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use memnet::{Error, RedisStore, VectorStore};
use std::env;

const REDIS_URL_ENV: &str = "MEMNET_TEST_REDIS_URL";

fn redis_url() -> Option<String> {
    env::var(REDIS_URL_ENV).ok()
}

/// Skips the test silently when no Redis endpoint is configured.
macro_rules! require_redis {
    () => {
        match redis_url() {
            Some(url) => url,
            None => {
                eprintln!("skipping: {REDIS_URL_ENV} not set");
                return;
            },
        }
    };
}

fn fresh_store(url: &str, suffix: &str) -> RedisStore {
    let collection = format!("memnet_test_{suffix}");
    let store = RedisStore::new(url, collection, None).expect("store");
    // Start from a clean index regardless of prior runs.
    let _ = store.ensure_collection_exists(common::DIMENSIONS, true);
    store
}

#[test]
fn redis_store_passes_contract_suite() {
    let url = require_redis!();
    let store = fresh_store(&url, "contract");
    common::run_contract_suite(&store);
}

#[test]
fn redis_dimension_guard() {
    let url = require_redis!();
    let store = fresh_store(&url, "dimension");

    store
        .insert(&[common::make_item(
            "dim-1",
            "u1",
            "seed",
            vec![0.1; common::DIMENSIONS],
        )])
        .expect("insert");

    let refused = store.ensure_collection_exists(common::DIMENSIONS * 2, false);
    assert!(matches!(refused, Err(Error::SchemaMismatch { .. })));

    store
        .ensure_collection_exists(common::DIMENSIONS * 2, true)
        .expect("recreate");
    assert!(
        store.get("dim-1").expect("get").is_none(),
        "recreation must drop indexed documents"
    );
}

#[test]
fn redis_embedding_bytes_roundtrip() {
    let url = require_redis!();
    let store = fresh_store(&url, "bytes");

    let embedding: Vec<f32> = (0..common::DIMENSIONS).map(|i| i as f32 * 0.125).collect();
    let item = common::make_item("bytes-1", "u1", "vector carrier", embedding.clone());
    store.insert(std::slice::from_ref(&item)).expect("insert");

    let fetched = store.get("bytes-1").expect("get").expect("present");
    assert_eq!(fetched.embedding, embedding);
}

#[test]
fn redis_partition_filter_escapes_reserved_characters() {
    let url = require_redis!();
    let store = fresh_store(&url, "escape");

    let hostile_user = "user-1:with@reserved{chars}";
    let item = common::make_item("esc-1", hostile_user, "escaped", vec![1.0, 0.0, 0.0, 0.0]);
    store.insert(std::slice::from_ref(&item)).expect("insert");

    let hits = store
        .search(&[1.0, 0.0, 0.0, 0.0], Some(hostile_user), 10)
        .expect("search with reserved characters");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].memory.id, "esc-1");

    store.delete_by_user(hostile_user).expect("delete by user");
    assert!(store.get("esc-1").expect("get").is_none());
}
