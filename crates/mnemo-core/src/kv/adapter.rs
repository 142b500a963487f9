//! Typed, batch-capable access over a primitive key-value client.
//!
//! The adapter owns the key schema and the value encodings: counters are
//! decimal strings, binary records are base64, metadata is JSON text. Batch
//! calls are split adaptively when the backend reports a size limit, halving
//! the chunk until it fits or a single key fails.

use super::client::{KvClient, KvError};
use crate::error::{Error, Result};
use crate::point::PointId;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;

/// Key of the populated-layer counter.
pub(crate) const KEY_LAYERS: &str = "layers";
/// Key of the entry point id; absent while the index is empty.
pub(crate) const KEY_ENTRY_POINT: &str = "ep";
/// Key of the point counter (the next id to assign).
pub(crate) const KEY_POINTS: &str = "points";

/// Key of a point record.
pub(crate) fn point_key(id: PointId) -> String {
    id.to_string()
}

/// Key of a metadata record.
pub(crate) fn metadata_key(id: PointId) -> String {
    format!("m:{id}")
}

/// Key of a layer-node record.
pub(crate) fn layer_node_key(layer: u32, id: PointId) -> String {
    format!("{layer}__{id}")
}

/// Namespaced, typed view of one contract's key-value namespace.
pub(crate) struct KvAdapter {
    client: Arc<dyn KvClient>,
}

impl KvAdapter {
    pub(crate) fn new(client: Arc<dyn KvClient>) -> Self {
        Self { client }
    }

    /// Reads a batch, adaptively halving the chunk size whenever the backend
    /// reports a size limit. Results preserve input order and length; a
    /// single key that still overflows propagates the backend error.
    pub(crate) async fn get_many_raw(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        let mut chunk = keys.len().max(1);
        let mut start = 0;
        while start < keys.len() {
            let end = keys.len().min(start + chunk);
            match self.client.get_many(&keys[start..end]).await {
                Ok(batch) => {
                    values.extend(batch);
                    start = end;
                }
                Err(KvError::SizeLimitExceeded(reason)) => {
                    if end - start <= 1 {
                        return Err(KvError::SizeLimitExceeded(reason).into());
                    }
                    chunk = (chunk / 2).max(1);
                    tracing::debug!(chunk, "read batch over size limit, splitting");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(values)
    }

    /// Writes a batch with the same adaptive splitting as
    /// [`Self::get_many_raw`].
    pub(crate) async fn set_many_raw(&self, entries: &[(String, String)]) -> Result<()> {
        let mut chunk = entries.len().max(1);
        let mut start = 0;
        while start < entries.len() {
            let end = entries.len().min(start + chunk);
            match self.client.set_many(&entries[start..end]).await {
                Ok(()) => start = end,
                Err(KvError::SizeLimitExceeded(reason)) => {
                    if end - start <= 1 {
                        return Err(KvError::SizeLimitExceeded(reason).into());
                    }
                    chunk = (chunk / 2).max(1);
                    tracing::debug!(chunk, "write batch over size limit, splitting");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Reads a decimal counter. Absent keys yield `None`.
    pub(crate) async fn get_counter(&self, key: &str) -> Result<Option<u32>> {
        match self.client.get(key).await? {
            None => Ok(None),
            Some(text) => text
                .parse::<u32>()
                .map(Some)
                .map_err(|_| Error::Corrupted(format!("key '{key}' holds non-numeric '{text}'"))),
        }
    }

    pub(crate) async fn set_counter(&self, key: &str, value: u32) -> Result<()> {
        self.client.set(key, value.to_string()).await?;
        Ok(())
    }

    /// Reads a base64-encoded binary record.
    pub(crate) async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.client.get(key).await? {
            None => Ok(None),
            Some(text) => decode_base64(key, &text).map(Some),
        }
    }

    pub(crate) async fn set_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        self.client.set(key, BASE64.encode(value)).await?;
        Ok(())
    }

    /// Batched variant of [`Self::get_bytes`]; preserves order and length.
    pub(crate) async fn get_many_bytes(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let values = self.get_many_raw(keys).await?;
        keys.iter()
            .zip(values)
            .map(|(key, value)| value.map(|text| decode_base64(key, &text)).transpose())
            .collect()
    }

    /// Batched variant of [`Self::set_bytes`].
    pub(crate) async fn set_many_bytes(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        let encoded: Vec<(String, String)> = entries
            .into_iter()
            .map(|(key, value)| (key, BASE64.encode(value)))
            .collect();
        self.set_many_raw(&encoded).await
    }

    /// Reads a plain-text value (metadata records are stored as JSON text).
    pub(crate) async fn get_text(&self, key: &str) -> Result<Option<String>> {
        Ok(self.client.get(key).await?)
    }

    pub(crate) async fn set_text(&self, key: &str, value: String) -> Result<()> {
        self.client.set(key, value).await?;
        Ok(())
    }

    /// Batched variant of [`Self::get_text`].
    pub(crate) async fn get_many_text(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.get_many_raw(keys).await
    }
}

fn decode_base64(key: &str, text: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text)
        .map_err(|e| Error::Corrupted(format!("key '{key}' holds invalid base64: {e}")))
}
