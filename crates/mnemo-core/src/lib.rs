//! # `mnemo` Core
//!
//! Semantic memory engine: HNSW vector search persisted in a key-value
//! backend.
//!
//! `mnemo` ingests embedding vectors with arbitrary JSON metadata and answers
//! approximate-nearest-neighbour queries over them. The entire graph lives in
//! the backend, one isolated namespace per tenant contract, so the engine
//! works over storage it does not trust with anything beyond single-key
//! atomicity: batches are split adaptively when the backend bounds them, and
//! every record decodes defensively.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mnemo_core::{IndexConfig, MemoryBackend, MemoryStore};
//! use serde_json::json;
//!
//! let store = MemoryStore::new(Arc::new(MemoryBackend::new()));
//! let index = store.open_index("contract-7", IndexConfig::new(768))?;
//!
//! let id = index.insert(embedding, Some(json!({"title": "Hello"}))).await?;
//! let hits = index.knn_search(&query, 10).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod codec;
pub mod config;
pub mod distance;
pub mod error;
pub mod hnsw;
pub mod kv;
pub mod memory;
pub mod point;
pub mod store;

pub use config::{ConfigError, IndexConfig, StoreConfig};
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use hnsw::Index;
pub use kv::{BatchLimits, KvClient, KvError, KvProvider, MemoryBackend, MemoryKv};
pub use memory::{Embedder, SemanticMemory};
pub use point::{IndexStats, NeighborMap, PointId, PointRecord, SearchResult};
pub use store::GraphStore;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide context: the injected backend plus the registry of open
/// contracts.
///
/// Created once at startup and shared; replaces backend singletons with an
/// explicit handle passed to whoever opens indices.
pub struct MemoryStore {
    backend: Arc<dyn KvProvider>,
    contracts: RwLock<HashMap<String, IndexConfig>>,
}

impl MemoryStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn KvProvider>) -> Self {
        Self {
            backend,
            contracts: RwLock::new(HashMap::new()),
        }
    }

    /// Binds an index handle to a contract namespace. Idempotent.
    ///
    /// Index compatibility is a caller responsibility the store enforces
    /// in-process: reopening a contract this store has already opened with a
    /// different configuration is refused, since the persisted graph does
    /// not record its own dimension or metric.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the configuration fails validation or
    /// conflicts with the configuration the contract is already open under.
    pub fn open_index(&self, contract_id: &str, config: IndexConfig) -> Result<Index> {
        config.validate()?;
        {
            let mut contracts = self.contracts.write();
            if let Some(existing) = contracts.get(contract_id) {
                if *existing != config {
                    return Err(Error::Config(format!(
                        "contract '{contract_id}' is already open with a different configuration"
                    )));
                }
            } else {
                contracts.insert(contract_id.to_string(), config);
            }
        }
        Index::open(self.backend.namespace(contract_id), config)
    }

    /// Contract ids this store has opened.
    #[must_use]
    pub fn contracts(&self) -> Vec<String> {
        self.contracts.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod config_tests;
