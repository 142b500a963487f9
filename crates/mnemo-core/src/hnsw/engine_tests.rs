//! Tests for the HNSW engine.

use super::engine::Index;
use crate::config::IndexConfig;
use crate::distance::DistanceMetric;
use crate::error::Error;
use crate::kv::{BatchLimits, KvClient, MemoryKv};
use crate::store::GraphStore;
use serde_json::json;
use std::sync::Arc;

fn config(dimension: usize) -> IndexConfig {
    IndexConfig {
        dimension,
        ..IndexConfig::default()
    }
}

/// Index plus an independent store view over the same namespace, so tests
/// can inspect the persisted graph directly.
fn open(cfg: IndexConfig) -> (Index, GraphStore) {
    open_on(Arc::new(MemoryKv::new()), cfg)
}

fn open_on(kv: Arc<MemoryKv>, cfg: IndexConfig) -> (Index, GraphStore) {
    let client: Arc<dyn KvClient> = kv;
    let index = Index::open(Arc::clone(&client), cfg).unwrap();
    let store = GraphStore::new(client, &cfg);
    (index, store)
}

#[allow(clippy::cast_precision_loss)]
fn sin_vector(i: usize, dimension: usize) -> Vec<f32> {
    (0..dimension)
        .map(|j| ((i * 127 + j) as f32 * 0.01).sin())
        .collect()
}

#[tokio::test]
async fn test_empty_index() {
    let (index, _) = open(config(4));
    let results = index.knn_search(&[1.0, 0.0, 0.0, 0.0], 5).await.unwrap();
    assert!(results.is_empty());

    let stats = index.stats().await.unwrap();
    assert_eq!(stats.num_points, 0);
    assert_eq!(stats.num_layers, 0);
}

#[tokio::test]
async fn test_first_insert_spans_layers() {
    let (index, store) = open(config(2));
    let id = index
        .insert_at_level(vec![1.0, 0.0], None, 2)
        .await
        .unwrap();

    assert_eq!(id, 0);
    assert_eq!(store.num_layers().await.unwrap(), 3);
    assert_eq!(store.entry_point().await.unwrap(), Some(0));
    for layer in 0..3 {
        assert!(store.neighbors(layer, 0).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_search_orders_by_distance_with_metadata() {
    let (index, _) = open(config(4));
    index
        .insert(vec![1.0, 0.0, 0.0, 0.0], Some(json!({"tag": "a"})))
        .await
        .unwrap();
    index
        .insert(vec![0.0, 1.0, 0.0, 0.0], Some(json!({"tag": "b"})))
        .await
        .unwrap();
    index
        .insert(vec![1.0, 1.0, 0.0, 0.0], Some(json!({"tag": "c"})))
        .await
        .unwrap();

    let results = index.knn_search(&[1.0, 0.1, 0.0, 0.0], 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, 0);
    assert_eq!(results[1].id, 2);
    assert!(results[0].distance <= results[1].distance);
    assert_eq!(results[0].metadata, Some(json!({"tag": "a"})));
    assert_eq!(results[1].metadata, Some(json!({"tag": "c"})));
}

#[tokio::test]
async fn test_get_round_trip() {
    let (index, _) = open(config(4));
    index.insert(vec![1.0, 0.0, 0.0, 0.0], None).await.unwrap();
    index
        .insert(vec![0.0, 1.0, 0.0, 0.0], Some(json!({"tag": "b"})))
        .await
        .unwrap();

    let record = index.get(1).await.unwrap();
    assert_eq!(record.vector, vec![0.0, 1.0, 0.0, 0.0]);
    assert_eq!(record.metadata, Some(json!({"tag": "b"})));

    // Metadata stays absent when never set.
    let record = index.get(0).await.unwrap();
    assert_eq!(record.metadata, None);

    let err = index.get(5).await.unwrap_err();
    assert!(matches!(err, Error::PointNotFound(5)));
}

#[tokio::test]
async fn test_dimension_guard_leaves_state_unchanged() {
    let (index, _) = open(config(4));
    for i in 0..3 {
        index.insert(sin_vector(i, 4), None).await.unwrap();
    }

    let err = index.insert(vec![1.0, 0.0, 0.0], None).await.unwrap_err();
    assert_eq!(err.code(), "MNEMO-001");
    assert_eq!(index.stats().await.unwrap().num_points, 3);

    let err = index.knn_search(&[1.0, 0.0], 1).await.unwrap_err();
    assert_eq!(err.code(), "MNEMO-001");
}

#[tokio::test]
async fn test_k_exceeding_ef_search_rejected() {
    let (index, _) = open(config(4));
    index.insert(sin_vector(0, 4), None).await.unwrap();

    let err = index
        .knn_search(&[1.0, 0.0, 0.0, 0.0], 51)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "MNEMO-006");
}

#[tokio::test]
async fn test_k_larger_than_point_count() {
    let (index, _) = open(config(4));
    for i in 0..3 {
        index.insert(sin_vector(i, 4), None).await.unwrap();
    }

    let results = index.knn_search(&sin_vector(0, 4), 50).await.unwrap();
    assert_eq!(results.len(), 3);

    let mut ids: Vec<_> = results.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3, "no duplicate ids");
    for pair in results.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[tokio::test]
async fn test_single_point_always_found() {
    let (index, _) = open(config(4));
    index.insert(vec![0.3, 0.1, 0.0, 0.9], None).await.unwrap();

    for k in [1, 5, 50] {
        let results = index.knn_search(&[1.0, 1.0, 1.0, 1.0], k).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 0);
    }
}

#[tokio::test]
async fn test_self_retrieval() {
    let (index, _) = open(config(16));
    for i in 0..40 {
        let id = index.insert(sin_vector(i, 16), None).await.unwrap();
        assert_eq!(id, i as u32);
    }

    for i in (0..40).step_by(7) {
        let query = sin_vector(i, 16);
        let results = index.knn_search(&query, 1).await.unwrap();
        assert_eq!(results[0].id, i as u32, "point {i} must be its own nearest");
        assert!(results[0].distance < 1e-5);
    }
}

#[tokio::test]
async fn test_growth_promotes_inserting_point_to_entry() {
    let (index, store) = open(config(4));
    for i in 0..6 {
        index.insert_at_level(sin_vector(i, 4), None, 0).await.unwrap();
    }
    assert_eq!(store.num_layers().await.unwrap(), 1);

    // The seventh insert lands three layers above the current top.
    index.insert_at_level(sin_vector(6, 4), None, 3).await.unwrap();

    assert_eq!(store.num_layers().await.unwrap(), 4);
    assert_eq!(store.entry_point().await.unwrap(), Some(6));
    for layer in 1..=3 {
        // Only the promoted point exists above layer 0.
        assert!(store.neighbors(layer, 6).await.is_ok());
    }
}

/// Reads the full persisted graph and checks the structural invariants.
async fn assert_graph_invariants(store: &GraphStore, cfg: &IndexConfig) {
    let num_points = store.num_points().await.unwrap();
    let num_layers = store.num_layers().await.unwrap();

    // Id contiguity: every id below the counter resolves, the next does not.
    let mut vectors = Vec::new();
    for id in 0..num_points {
        vectors.push(store.point(id).await.unwrap());
    }
    assert!(store.point(num_points).await.is_err());

    // Entry-point dominance: the entry point spans every populated layer.
    let ep = store.entry_point().await.unwrap().unwrap();
    for layer in 0..num_layers {
        store.neighbors(layer, ep).await.unwrap();
    }

    for id in 0..num_points {
        let mut records = Vec::new();
        for layer in 0..num_layers {
            records.push(store.neighbors(layer, id).await.ok());
        }
        // Every point exists at least at layer 0.
        assert!(records[0].is_some(), "point {id} missing from layer 0");

        let mut gap = false;
        for (layer, record) in records.iter().enumerate() {
            let layer = layer as u32;
            let Some(map) = record else {
                gap = true;
                continue;
            };
            // Layer monotonicity: records form a contiguous prefix of layers.
            assert!(!gap, "point {id} present at layer {layer} above a gap");
            // Degree bound per layer.
            assert!(
                map.len() <= cfg.m_max(layer),
                "point {id} layer {layer} has degree {}",
                map.len()
            );
            // Edge distance fidelity against the immutable vectors.
            for (&neighbor, &cached) in map {
                let actual = cfg
                    .metric
                    .distance(&vectors[id as usize], &vectors[neighbor as usize]);
                assert!(
                    (cached - actual).abs() < 1e-4,
                    "edge {id}->{neighbor} cached {cached} actual {actual}"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_structural_invariants_after_build() {
    let cfg = IndexConfig {
        dimension: 16,
        m: 4,
        ef_construction: 50,
        ef_search: 50,
        metric: DistanceMetric::Cosine,
        cache_size: 64,
    };
    let (index, store) = open(cfg);
    for i in 0..200 {
        index.insert(sin_vector(i, 16), None).await.unwrap();
    }

    assert_eq!(store.num_points().await.unwrap(), 200);
    assert_graph_invariants(&store, &cfg).await;
}

#[tokio::test]
async fn test_recall_against_brute_force() {
    let cfg = IndexConfig {
        dimension: 32,
        ..IndexConfig::default()
    };
    let (index, _) = open(cfg);
    for i in 0..200 {
        index.insert(sin_vector(i, 32), None).await.unwrap();
    }

    let query = sin_vector(500, 32);
    let mut exact: Vec<(f32, u32)> = (0..200)
        .map(|i| (cfg.metric.distance(&query, &sin_vector(i, 32)), i as u32))
        .collect();
    exact.sort_by(|a, b| a.0.total_cmp(&b.0));

    let results = index.knn_search(&query, 10).await.unwrap();
    assert_eq!(results.len(), 10);
    assert_eq!(results[0].id, exact[0].1, "top hit must be the true nearest");

    let expected: Vec<u32> = exact.iter().take(10).map(|&(_, id)| id).collect();
    let overlap = results
        .iter()
        .filter(|r| expected.contains(&r.id))
        .count();
    assert!(overlap >= 8, "recall@10 too low: {overlap}/10");
}

#[tokio::test]
async fn test_build_over_batch_limited_backend() {
    // The backend refuses any batch above 8 entries; inserts must still
    // complete through adaptive splitting.
    let kv = Arc::new(MemoryKv::with_limits(BatchLimits::entries(8)));
    let cfg = IndexConfig {
        dimension: 8,
        m: 16,
        ..IndexConfig::default()
    };
    let (index, store) = open_on(kv, cfg);

    for i in 0..80 {
        index.insert(sin_vector(i, 8), None).await.unwrap();
    }
    assert_eq!(store.num_points().await.unwrap(), 80);

    let results = index.knn_search(&sin_vector(3, 8), 5).await.unwrap();
    assert_eq!(results.len(), 5);
    assert_eq!(results[0].id, 3);
}

#[tokio::test]
async fn test_invalid_config_rejected_at_open() {
    let kv: Arc<dyn KvClient> = Arc::new(MemoryKv::new());
    let bad = IndexConfig {
        dimension: 0,
        ..IndexConfig::default()
    };
    assert!(Index::open(kv.clone(), bad).is_err());

    let bad = IndexConfig {
        m: 1,
        ..IndexConfig::default()
    };
    assert!(Index::open(kv, bad).is_err());
}

#[tokio::test]
async fn test_stats_reports_counters_and_cache() {
    let (index, _) = open(config(4));
    for i in 0..10 {
        index.insert(sin_vector(i, 4), None).await.unwrap();
    }

    let stats = index.stats().await.unwrap();
    assert_eq!(stats.num_points, 10);
    assert!(stats.num_layers >= 1);
    assert_eq!(stats.config.dimension, 4);
    let cache = stats.cache.expect("cache enabled by default");
    assert!(cache.hits + cache.misses > 0);
}
