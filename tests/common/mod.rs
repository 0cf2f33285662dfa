//! Shared store-contract assertions.
//!
//! The in-memory store is authoritative for [`VectorStore`] semantics;
//! every backend must pass this same suite. Wire-backend integration tests
//! reuse it behind their environment gates.

#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use memnet::{MemoryItem, VectorStore};

/// Dimension used by the contract suite.
pub const DIMENSIONS: usize = 4;

/// Builds a memory with a fixed id, partition, and embedding.
pub fn make_item(id: &str, user: &str, data: &str, embedding: Vec<f32>) -> MemoryItem {
    let mut item = MemoryItem::new(data, embedding);
    item.id = id.to_string();
    item.user_id = Some(user.to_string());
    item.metadata.insert(
        "origin".to_string(),
        serde_json::Value::String("contract-suite".to_string()),
    );
    item
}

/// Invariant: insert-then-get round-trips the caller-visible fields.
pub fn check_roundtrip(store: &dyn VectorStore) {
    let mut item = make_item("rt-1", "u1", "User plays chess", vec![1.0, 0.0, 0.0, 0.0]);
    item.agent_id = Some("a1".to_string());
    item.run_id = Some("r1".to_string());
    store.insert(std::slice::from_ref(&item)).expect("insert");

    let fetched = store.get("rt-1").expect("get").expect("item present");
    assert_eq!(fetched.data, item.data);
    assert_eq!(fetched.user_id, item.user_id);
    assert_eq!(fetched.agent_id, item.agent_id);
    assert_eq!(fetched.run_id, item.run_id);
    assert_eq!(fetched.metadata, item.metadata);
    assert_eq!(
        fetched.created_at.timestamp_millis(),
        item.created_at.timestamp_millis()
    );
}

/// Invariant: search and list never cross partitions.
pub fn check_partition_isolation(store: &dyn VectorStore) {
    store
        .insert(&[
            make_item("p-u1", "u1", "u1 memory", vec![1.0, 0.0, 0.0, 0.0]),
            make_item("p-u2", "u2", "u2 memory", vec![1.0, 0.0, 0.0, 0.0]),
        ])
        .expect("insert");

    let hits = store
        .search(&[1.0, 0.0, 0.0, 0.0], Some("u1"), 10)
        .expect("search");
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|hit| hit.memory.user_id.as_deref() == Some("u1")));

    let listed = store.list(Some("u1"), 10).expect("list");
    assert!(listed.iter().all(|item| item.user_id.as_deref() == Some("u1")));
}

/// Invariant: result counts respect the limit.
pub fn check_limit_bound(store: &dyn VectorStore) {
    let items: Vec<MemoryItem> = (0..6)
        .map(|i| {
            make_item(
                &format!("lim-{i}"),
                "limit-user",
                "limit memory",
                vec![0.5, 0.5, 0.0, 0.0],
            )
        })
        .collect();
    store.insert(&items).expect("insert");

    assert!(store.search(&[0.5, 0.5, 0.0, 0.0], Some("limit-user"), 3).expect("search").len() <= 3);
    assert!(store.list(Some("limit-user"), 2).expect("list").len() <= 2);
}

/// Invariant: update replaces data and advances `updated_at`.
pub fn check_update_monotonicity(store: &dyn VectorStore) {
    let item = make_item("up-1", "u1", "original text", vec![0.0, 1.0, 0.0, 0.0]);
    store.insert(std::slice::from_ref(&item)).expect("insert");

    let mut updated = item;
    updated.data = "revised text".to_string();
    updated.updated_at = Some(chrono::Utc::now() + chrono::Duration::seconds(1));
    store.update(std::slice::from_ref(&updated)).expect("update");

    let fetched = store.get("up-1").expect("get").expect("item present");
    assert_eq!(fetched.data, "revised text");
    assert!(fetched.updated_at.expect("updated_at set") > fetched.created_at);
}

/// Invariant: a deleted id disappears from get and search.
pub fn check_delete_erases(store: &dyn VectorStore) {
    let item = make_item("del-1", "del-user", "to be removed", vec![0.0, 0.0, 1.0, 0.0]);
    store.insert(std::slice::from_ref(&item)).expect("insert");
    store.delete("del-1").expect("delete");

    assert!(store.get("del-1").expect("get").is_none());
    let hits = store
        .search(&[0.0, 0.0, 1.0, 0.0], Some("del-user"), 10)
        .expect("search");
    assert!(hits.iter().all(|hit| hit.memory.id != "del-1"));

    // Deleting an absent id stays a no-op.
    store.delete("del-1").expect("repeat delete");
}

/// Invariant: every score sits in [0, 1].
pub fn check_score_bounds(store: &dyn VectorStore) {
    store
        .insert(&[
            make_item("sc-1", "score-user", "aligned", vec![1.0, 0.0, 0.0, 0.0]),
            make_item("sc-2", "score-user", "opposed", vec![-1.0, 0.0, 0.0, 0.0]),
        ])
        .expect("insert");

    let hits = store
        .search(&[1.0, 0.0, 0.0, 0.0], Some("score-user"), 10)
        .expect("search");
    for hit in hits {
        assert!(hit.score >= 0.0, "score {} below 0", hit.score);
        assert!(hit.score <= 1.0, "score {} above 1", hit.score);
    }
}

/// Runs the whole contract suite against an initialized store.
pub fn run_contract_suite(store: &dyn VectorStore) {
    check_roundtrip(store);
    check_partition_isolation(store);
    check_limit_bound(store);
    check_update_monotonicity(store);
    check_delete_erases(store);
    check_score_bounds(store);
}
