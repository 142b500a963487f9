//! Semantic memory service: text in, scored recollections out.
//!
//! The engine itself never sees text. This layer composes an embedding
//! provider with the index, storing the source text in the payload so a
//! recollection carries what was remembered, not just where it lives in
//! embedding space.

use crate::error::{Error, Result};
use crate::hnsw::Index;
use crate::point::{PointId, SearchResult};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

/// An embedding provider with a fixed output dimension per process.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Output dimension of every vector this provider produces.
    fn dimension(&self) -> usize;

    /// Embeds one text into a vector of [`Self::dimension`] components.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A tenant's semantic memory: an index plus the embedder feeding it.
pub struct SemanticMemory {
    index: Index,
    embedder: Arc<dyn Embedder>,
}

impl SemanticMemory {
    /// Couples an index with an embedding provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when the provider's output
    /// dimension differs from the index dimension.
    pub fn new(index: Index, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let expected = index.config().dimension;
        if embedder.dimension() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: embedder.dimension(),
            });
        }
        Ok(Self { index, embedder })
    }

    /// Stores one text with optional extra metadata, returning the assigned
    /// point id.
    ///
    /// The text lands in the payload under `"content"`; caller-supplied
    /// object fields are carried alongside without overriding it.
    pub async fn remember(&self, content: &str, metadata: Option<JsonValue>) -> Result<PointId> {
        let vector = self.embedder.embed(content).await?;
        let payload = match metadata {
            Some(JsonValue::Object(mut fields)) => {
                fields
                    .entry("content".to_string())
                    .or_insert_with(|| json!(content));
                JsonValue::Object(fields)
            }
            Some(other) => json!({ "content": content, "data": other }),
            None => json!({ "content": content }),
        };
        self.index.insert(vector, Some(payload)).await
    }

    /// Returns the `k` stored texts closest to `query` in embedding space.
    pub async fn recall(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let vector = self.embedder.embed(query).await?;
        self.index.knn_search(&vector, k).await
    }

    /// The underlying index handle.
    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }
}
