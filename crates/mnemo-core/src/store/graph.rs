//! Typed graph operations over the key-value adapter.

use crate::cache::{CacheStats, LruCache};
use crate::codec;
use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::kv::{
    layer_node_key, metadata_key, point_key, KvAdapter, KvClient, KEY_ENTRY_POINT, KEY_LAYERS,
    KEY_POINTS,
};
use crate::point::{NeighborMap, PointId};
use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Durable representation of one HNSW graph: points, per-layer adjacency,
/// entry point, counters and per-point metadata. Pure data operations; the
/// traversal logic lives in the engine.
///
/// All operations are individually atomic at the key level. Multi-key writes
/// are not atomic; the single-writer contract makes that acceptable.
pub struct GraphStore {
    kv: KvAdapter,
    dimension: usize,
    adjacency_cache: Option<LruCache<(u32, PointId), NeighborMap>>,
}

impl GraphStore {
    /// Binds a graph store to a contract namespace.
    #[must_use]
    pub fn new(client: Arc<dyn KvClient>, config: &IndexConfig) -> Self {
        let adjacency_cache = (config.cache_size > 0).then(|| LruCache::new(config.cache_size));
        Self {
            kv: KvAdapter::new(client),
            dimension: config.dimension,
            adjacency_cache,
        }
    }

    /// The fixed vector dimension of this graph.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Adjacency cache counters, when the cache is enabled.
    #[must_use]
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.adjacency_cache.as_ref().map(LruCache::stats)
    }

    /// Reads the entry point id. Absent while the index is empty.
    pub async fn entry_point(&self) -> Result<Option<PointId>> {
        self.kv.get_counter(KEY_ENTRY_POINT).await
    }

    /// Overwrites the entry point id.
    pub async fn set_entry_point(&self, id: PointId) -> Result<()> {
        self.kv.set_counter(KEY_ENTRY_POINT, id).await
    }

    /// Number of stored points; also the next id to assign.
    pub async fn num_points(&self) -> Result<u32> {
        Ok(self.kv.get_counter(KEY_POINTS).await?.unwrap_or(0))
    }

    /// Number of populated layers.
    pub async fn num_layers(&self) -> Result<u32> {
        Ok(self.kv.get_counter(KEY_LAYERS).await?.unwrap_or(0))
    }

    /// Appends a point, assigning the next contiguous id.
    ///
    /// Writes the point record first and the counter second, so a failure in
    /// between leaves the counter consistent with the readable prefix.
    pub async fn new_point(&self, vector: &[f32]) -> Result<PointId> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let id = self.num_points().await?;
        self.kv
            .set_bytes(&point_key(id), &codec::encode_point(id, vector))
            .await?;
        self.kv.set_counter(KEY_POINTS, id + 1).await?;
        Ok(id)
    }

    /// Reads one point's vector.
    pub async fn point(&self, id: PointId) -> Result<Vec<f32>> {
        let bytes = self
            .kv
            .get_bytes(&point_key(id))
            .await?
            .ok_or(Error::PointNotFound(id))?;
        self.decode_point(id, &bytes)
    }

    /// Reads a batch of vectors, preserving input order. Fails fast on the
    /// first absent id, reporting which.
    pub async fn points(&self, ids: &[PointId]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = ids.iter().map(|&id| point_key(id)).collect();
        let values = self.kv.get_many_bytes(&keys).await?;
        ids.iter()
            .zip(values)
            .map(|(&id, bytes)| {
                let bytes = bytes.ok_or(Error::PointNotFound(id))?;
                self.decode_point(id, &bytes)
            })
            .collect()
    }

    fn decode_point(&self, id: PointId, bytes: &[u8]) -> Result<Vec<f32>> {
        let (stored_id, vector) = codec::decode_point(bytes)?;
        if stored_id != id {
            return Err(Error::Corrupted(format!(
                "point record {id} declares id {stored_id}"
            )));
        }
        if vector.len() != self.dimension {
            return Err(Error::Corrupted(format!(
                "point {id} has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(vector)
    }

    /// Reads one point's adjacency in one layer.
    pub async fn neighbors(&self, layer: u32, id: PointId) -> Result<NeighborMap> {
        if let Some(cache) = &self.adjacency_cache {
            if let Some(map) = cache.get(&(layer, id)) {
                return Ok(map);
            }
        }
        let bytes = self
            .kv
            .get_bytes(&layer_node_key(layer, id))
            .await?
            .ok_or(Error::LayerNodeNotFound { layer, id })?;
        let map = self.decode_layer_node(layer, id, &bytes)?;
        if let Some(cache) = &self.adjacency_cache {
            cache.insert((layer, id), map.clone());
        }
        Ok(map)
    }

    /// Reads a batch of adjacencies in one layer. Fails fast on the first
    /// absent record, reporting which.
    pub async fn neighbors_many(
        &self,
        layer: u32,
        ids: &[PointId],
    ) -> Result<FxHashMap<PointId, NeighborMap>> {
        let mut found: FxHashMap<PointId, NeighborMap> = FxHashMap::default();
        let mut missing: Vec<PointId> = Vec::new();
        if let Some(cache) = &self.adjacency_cache {
            for &id in ids {
                match cache.get(&(layer, id)) {
                    Some(map) => {
                        found.insert(id, map);
                    }
                    None => missing.push(id),
                }
            }
        } else {
            missing.extend_from_slice(ids);
        }

        if !missing.is_empty() {
            let keys: Vec<String> = missing.iter().map(|&id| layer_node_key(layer, id)).collect();
            let values = self.kv.get_many_bytes(&keys).await?;
            for (&id, bytes) in missing.iter().zip(values) {
                let bytes = bytes.ok_or(Error::LayerNodeNotFound { layer, id })?;
                let map = self.decode_layer_node(layer, id, &bytes)?;
                if let Some(cache) = &self.adjacency_cache {
                    cache.insert((layer, id), map.clone());
                }
                found.insert(id, map);
            }
        }
        Ok(found)
    }

    fn decode_layer_node(&self, layer: u32, id: PointId, bytes: &[u8]) -> Result<NeighborMap> {
        let (stored_id, stored_layer, map) = codec::decode_layer_node(bytes)?;
        if stored_id != id || stored_layer != layer {
            return Err(Error::Corrupted(format!(
                "layer node ({layer}, {id}) declares ({stored_layer}, {stored_id})"
            )));
        }
        Ok(map)
    }

    /// Overwrites one point's adjacency in one layer, refreshing the cache.
    pub async fn upsert_neighbors(
        &self,
        layer: u32,
        id: PointId,
        neighbors: &NeighborMap,
    ) -> Result<()> {
        self.kv
            .set_bytes(
                &layer_node_key(layer, id),
                &codec::encode_layer_node(id, layer, neighbors),
            )
            .await?;
        if let Some(cache) = &self.adjacency_cache {
            cache.insert((layer, id), neighbors.clone());
        }
        Ok(())
    }

    /// Batched overwrite of adjacencies in one layer.
    pub async fn upsert_neighbors_many(
        &self,
        layer: u32,
        updates: &FxHashMap<PointId, NeighborMap>,
    ) -> Result<()> {
        let entries: Vec<(String, Vec<u8>)> = updates
            .iter()
            .map(|(&id, map)| {
                (
                    layer_node_key(layer, id),
                    codec::encode_layer_node(id, layer, map).to_vec(),
                )
            })
            .collect();
        self.kv.set_many_bytes(entries).await?;
        if let Some(cache) = &self.adjacency_cache {
            for (&id, map) in updates {
                cache.insert((layer, id), map.clone());
            }
        }
        Ok(())
    }

    /// Creates an empty adjacency for `id` at the current top layer, then
    /// bumps the layer counter.
    ///
    /// Single-writer contract: this reads-then-writes the counter without
    /// compare-and-swap; concurrent callers race and may lose updates.
    pub async fn promote_to_new_layer(&self, id: PointId) -> Result<()> {
        let layer = self.num_layers().await?;
        self.upsert_neighbors(layer, id, &NeighborMap::default())
            .await?;
        self.kv.set_counter(KEY_LAYERS, layer + 1).await?;
        tracing::debug!(id, layer, "promoted point to new layer");
        Ok(())
    }

    /// Reads one point's metadata. Absent if never set.
    pub async fn metadata(&self, id: PointId) -> Result<Option<JsonValue>> {
        match self.kv.get_text(&metadata_key(id)).await? {
            None => Ok(None),
            Some(text) => parse_metadata(id, &text).map(Some),
        }
    }

    /// Reads a batch of metadata records, preserving input order. Absent
    /// records yield `None`.
    pub async fn metadata_many(&self, ids: &[PointId]) -> Result<Vec<Option<JsonValue>>> {
        let keys: Vec<String> = ids.iter().map(|&id| metadata_key(id)).collect();
        let values = self.kv.get_many_text(&keys).await?;
        ids.iter()
            .zip(values)
            .map(|(&id, text)| text.map(|t| parse_metadata(id, &t)).transpose())
            .collect()
    }

    /// Overwrites one point's metadata.
    pub async fn set_metadata(&self, id: PointId, metadata: &JsonValue) -> Result<()> {
        let text = serde_json::to_string(metadata)?;
        self.kv.set_text(&metadata_key(id), text).await
    }
}

fn parse_metadata(id: PointId, text: &str) -> Result<JsonValue> {
    serde_json::from_str(text)
        .map_err(|e| Error::Corrupted(format!("metadata for point {id} is not valid JSON: {e}")))
}
