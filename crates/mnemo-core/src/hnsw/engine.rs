//! The HNSW engine: insert, search and the traversal primitives.

use super::OrderedFloat;
use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::kv::KvClient;
use crate::point::{IndexStats, NeighborMap, PointId, PointRecord, SearchResult};
use crate::store::GraphStore;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value as JsonValue;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A candidate or result link: distance to the query, point id.
type Scored = (f32, PointId);

/// Handle to one contract's vector index.
///
/// Reads and writes go straight through to the contract namespace; the
/// handle itself holds only the configuration, the adjacency cache and the
/// level-selection RNG state.
///
/// # Concurrency
///
/// Single writer, multiple readers. [`Index::knn_search`] and [`Index::get`]
/// never mutate and may run concurrently with one in-flight
/// [`Index::insert`]; two concurrent inserts on the same contract are a
/// caller error and can corrupt the layer counter. Both operations suspend
/// only at key-value calls and are safely cancellable there; a cancelled
/// insert is equivalent to a backend failure after its last completed write.
pub struct Index {
    store: GraphStore,
    config: IndexConfig,
    rng_state: AtomicU64,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index").finish_non_exhaustive()
    }
}

impl Index {
    /// Binds an index to a contract namespace.
    ///
    /// Idempotent: opening the same namespace with the same configuration
    /// yields interchangeable handles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the configuration fails validation.
    pub fn open(namespace: Arc<dyn KvClient>, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: GraphStore::new(namespace, &config),
            config,
            rng_state: AtomicU64::new(0x9E37_79B9_7F4A_7C15),
        })
    }

    /// The configuration this index was opened with.
    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Inserts a vector with optional metadata, returning its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] before any write when the vector
    /// length differs from the index dimension. Backend errors mid-insert
    /// can leave the point as a partially linked orphan; see the concurrency
    /// notes on [`Index`].
    pub async fn insert(&self, vector: Vec<f32>, metadata: Option<JsonValue>) -> Result<PointId> {
        if vector.len() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }
        let level = self.select_layer();
        self.insert_at_level(vector, metadata, level).await
    }

    /// Insert with an explicit target layer. Split out so tests can pin the
    /// layer assignment instead of sampling it.
    pub(crate) async fn insert_at_level(
        &self,
        vector: Vec<f32>,
        metadata: Option<JsonValue>,
        level: u32,
    ) -> Result<PointId> {
        let entry = self.store.entry_point().await?;
        let num_layers = self.store.num_layers().await?;
        let expected = self.store.num_points().await?;

        let id = self.store.new_point(&vector).await?;
        if id != expected {
            return Err(Error::ConcurrentWrite(format!(
                "point counter moved from {expected} to {id} during insert"
            )));
        }
        if let Some(meta) = &metadata {
            self.store.set_metadata(id, meta).await?;
        }

        let Some(ep) = entry else {
            // First point: it spans every layer and becomes the entry point.
            for _ in 0..=level {
                self.store.promote_to_new_layer(id).await?;
            }
            self.store.set_entry_point(id).await?;
            tracing::debug!(id, level, "inserted first point");
            return Ok(id);
        };

        if num_layers == 0 {
            return Err(Error::Corrupted(
                "entry point set but layer counter is zero".to_string(),
            ));
        }
        let top = num_layers - 1;
        let ep_vector = self.store.point(ep).await?;
        let mut eps: Vec<Scored> = vec![(self.config.metric.distance(&vector, &ep_vector), ep)];

        // Route greedily from the top layer down to the first layer the new
        // point participates in.
        let mut layer = top;
        while layer > level {
            eps = self.search_layer(&vector, &eps, 1, layer).await?;
            layer -= 1;
        }

        // Link layer by layer, reusing this layer's result set as the entry
        // points of the next one down.
        let mut current = top.min(level);
        loop {
            let found = self
                .search_layer(&vector, &eps, self.config.ef_construction, current)
                .await?;
            self.link(id, &found, current).await?;
            eps = found;
            if current == 0 {
                break;
            }
            current -= 1;
        }

        if level + 1 > num_layers {
            for _ in num_layers..=level {
                self.store.promote_to_new_layer(id).await?;
            }
            self.store.set_entry_point(id).await?;
        }
        tracing::debug!(id, level, "inserted point");
        Ok(id)
    }

    /// Connects a freshly stored point to its chosen neighbors in one layer,
    /// adding both edge directions and pruning any neighbor that overflows
    /// the degree cap.
    async fn link(&self, id: PointId, found: &[Scored], layer: u32) -> Result<()> {
        let cap = self.config.m_max(layer);
        let chosen = select_neighbors(found, cap, true);

        let chosen_ids: Vec<PointId> = chosen.iter().map(|&(_, n)| n).collect();
        let mut adjacencies = self.store.neighbors_many(layer, &chosen_ids).await?;

        let mut own = NeighborMap::default();
        let mut updated: FxHashMap<PointId, NeighborMap> = FxHashMap::default();
        for &(dist, neighbor) in &chosen {
            own.insert(neighbor, dist);

            let adjacency = adjacencies
                .get_mut(&neighbor)
                .ok_or(Error::LayerNodeNotFound { layer, id: neighbor })?;
            adjacency.insert(id, dist);
            if adjacency.len() > cap {
                // The cached edge distances are from this neighbor's own
                // perspective, so re-selection needs no vector fetches.
                let mut candidates: Vec<Scored> =
                    adjacency.iter().map(|(&n, &d)| (d, n)).collect();
                candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
                *adjacency = select_neighbors(&candidates, cap, true)
                    .into_iter()
                    .map(|(d, n)| (n, d))
                    .collect();
            }
            updated.insert(neighbor, adjacency.clone());
        }

        self.store.upsert_neighbors(layer, id, &own).await?;
        self.store.upsert_neighbors_many(layer, &updated).await
    }

    /// Returns the `k` nearest neighbors of `query` with their metadata.
    ///
    /// Never mutates; an empty index yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for a query of the wrong length
    /// and [`Error::Config`] when `k` exceeds the configured `ef_search`.
    pub async fn knn_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.len(),
            });
        }
        if k > self.config.ef_search {
            return Err(Error::Config(format!(
                "k ({k}) exceeds ef_search ({})",
                self.config.ef_search
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(ep) = self.store.entry_point().await? else {
            return Ok(Vec::new());
        };
        let num_layers = self.store.num_layers().await?;
        if num_layers == 0 {
            return Err(Error::Corrupted(
                "entry point set but layer counter is zero".to_string(),
            ));
        }

        let ep_vector = self.store.point(ep).await?;
        let mut eps: Vec<Scored> = vec![(self.config.metric.distance(query, &ep_vector), ep)];

        let mut layer = num_layers - 1;
        while layer > 0 {
            eps = self.search_layer(query, &eps, 1, layer).await?;
            layer -= 1;
        }
        let mut hits = self
            .search_layer(query, &eps, self.config.ef_search.max(k), 0)
            .await?;
        hits.truncate(k);

        let ids: Vec<PointId> = hits.iter().map(|&(_, id)| id).collect();
        let metadata = self.store.metadata_many(&ids).await?;
        tracing::debug!(k, found = hits.len(), "knn search complete");

        Ok(hits
            .into_iter()
            .zip(metadata)
            .map(|((distance, id), metadata)| SearchResult {
                id,
                distance,
                metadata,
            })
            .collect())
    }

    /// Reads one stored point and its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PointNotFound`] when `id` was never assigned.
    pub async fn get(&self, id: PointId) -> Result<PointRecord> {
        if id >= self.store.num_points().await? {
            return Err(Error::PointNotFound(id));
        }
        let vector = self.store.point(id).await?;
        let metadata = self.store.metadata(id).await?;
        Ok(PointRecord { vector, metadata })
    }

    /// Reads the index-global counters.
    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            num_points: self.store.num_points().await?,
            num_layers: self.store.num_layers().await?,
            config: self.config,
            cache: self.store.cache_stats(),
        })
    }

    /// Greedy best-first search within a single layer.
    ///
    /// Expands the closest unexpanded candidate until none can improve on
    /// the furthest of the best `ef` found so far; neighbor vectors are
    /// fetched one batch per expansion.
    async fn search_layer(
        &self,
        query: &[f32],
        entry: &[Scored],
        ef: usize,
        layer: u32,
    ) -> Result<Vec<Scored>> {
        let mut visited: FxHashSet<PointId> = FxHashSet::default();
        let mut candidates: BinaryHeap<Reverse<(OrderedFloat, PointId)>> = BinaryHeap::new();
        let mut results: BinaryHeap<(OrderedFloat, PointId)> = BinaryHeap::new();

        for &(dist, id) in entry {
            if visited.insert(id) {
                candidates.push(Reverse((OrderedFloat(dist), id)));
                results.push((OrderedFloat(dist), id));
            }
        }
        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse((OrderedFloat(c_dist), c_id))) = candidates.pop() {
            let furthest = results.peek().map_or(f32::MAX, |r| r.0 .0);
            if c_dist > furthest {
                break;
            }

            let adjacency = self.store.neighbors(layer, c_id).await?;
            let unvisited: Vec<PointId> = adjacency
                .keys()
                .copied()
                .filter(|n| visited.insert(*n))
                .collect();
            if unvisited.is_empty() {
                continue;
            }

            let vectors = self.store.points(&unvisited).await?;
            for (&neighbor, vector) in unvisited.iter().zip(&vectors) {
                let dist = self.config.metric.distance(query, vector);
                let furthest = results.peek().map_or(f32::MAX, |r| r.0 .0);
                if dist < furthest || results.len() < ef {
                    candidates.push(Reverse((OrderedFloat(dist), neighbor)));
                    results.push((OrderedFloat(dist), neighbor));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<Scored> = results
            .into_iter()
            .map(|(OrderedFloat(dist), id)| (dist, id))
            .collect();
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(out)
    }

    /// Samples the target layer for a new point: geometric with scale
    /// `1 / ln(M)`, so roughly half of all points stay at layer 0.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn select_layer(&self) -> u32 {
        // xorshift64; the handle is the single writer, so Relaxed is enough.
        let mut state = self.rng_state.load(Ordering::Relaxed);
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        self.rng_state.store(state, Ordering::Relaxed);

        #[allow(clippy::cast_precision_loss)]
        let uniform = (state as f64) / (u64::MAX as f64);
        let level = (-uniform.ln() * self.config.level_mult()).floor() as u32;
        level.min(15)
    }
}

/// Neighbor selection: consume candidates in ascending-distance order,
/// admitting one only when it improves on the closest already selected, and
/// backfill from the discarded reservoir when `keep_pruned` is set.
///
/// With sorted input this keeps the `cap` closest candidates; the reservoir
/// exists so a partially filled result is topped up in distance order.
fn select_neighbors(candidates: &[Scored], cap: usize, keep_pruned: bool) -> Vec<Scored> {
    let mut results: Vec<Scored> = Vec::with_capacity(cap);
    let mut discarded: Vec<Scored> = Vec::new();

    // A candidate is admitted only when it beats the closest result so far,
    // so the running minimum is always the most recently admitted distance.
    let mut best = f32::MAX;
    for &(dist, id) in candidates {
        if results.len() >= cap {
            break;
        }
        if results.is_empty() || dist < best {
            results.push((dist, id));
            best = dist;
        } else {
            discarded.push((dist, id));
        }
    }

    if keep_pruned {
        for &(dist, id) in &discarded {
            if results.len() >= cap {
                break;
            }
            results.push((dist, id));
        }
    }
    results
}
