//! Point records, search results and index statistics.

use crate::cache::CacheStats;
use crate::config::IndexConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Unique identifier for a point in the index.
///
/// Ids are assigned contiguously starting at 0 and are never reused.
pub type PointId = u32;

/// Adjacency of one point in one layer: neighbor id to the distance cached
/// when the edge was created.
pub type NeighborMap = rustc_hash::FxHashMap<PointId, f32>;

/// The stored state of one point, as returned by [`Index::get`].
///
/// [`Index::get`]: crate::Index::get
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointRecord {
    /// The stored vector.
    pub vector: Vec<f32>,

    /// The stored metadata, absent if never set.
    pub metadata: Option<JsonValue>,
}

/// A single k-NN search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Id of the matching point.
    pub id: PointId,

    /// Distance to the query under the index metric (lower is closer).
    pub distance: f32,

    /// Metadata stored with the point, absent if never set.
    pub metadata: Option<JsonValue>,
}

/// Snapshot of index-global state, as returned by [`Index::stats`].
///
/// [`Index::stats`]: crate::Index::stats
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// Number of stored points (also the next id to assign).
    pub num_points: u32,

    /// Number of populated layers.
    pub num_layers: u32,

    /// The configuration the index was opened with.
    pub config: IndexConfig,

    /// Adjacency cache counters, when the cache is enabled.
    pub cache: Option<CacheStats>,
}
