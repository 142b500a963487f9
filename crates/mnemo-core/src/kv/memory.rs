//! In-memory key-value backend.
//!
//! Backs local deployments, unit tests and benches. Batch ceilings reproduce
//! the size-limit failure mode of bounded backends so the adapter's splitting
//! path is exercised without a network.

use super::client::{KvClient, KvError, KvProvider};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Batch ceilings enforced by [`MemoryKv`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchLimits {
    /// Maximum entries per batch call, `None` = unbounded.
    pub max_entries: Option<usize>,

    /// Maximum total payload bytes per batch write, `None` = unbounded.
    pub max_bytes: Option<usize>,
}

impl BatchLimits {
    /// Unbounded batches.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_entries: None,
            max_bytes: None,
        }
    }

    /// Caps batches at `max_entries` entries.
    #[must_use]
    pub const fn entries(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            max_bytes: None,
        }
    }
}

/// A single in-memory namespace.
pub struct MemoryKv {
    data: RwLock<HashMap<String, String>>,
    limits: BatchLimits,
}

impl MemoryKv {
    /// Creates an empty namespace with unbounded batches.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(BatchLimits::unbounded())
    }

    /// Creates an empty namespace with the given batch ceilings.
    #[must_use]
    pub fn with_limits(limits: BatchLimits) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the namespace holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn check_batch(&self, entries: usize, bytes: usize) -> Result<(), KvError> {
        if let Some(max) = self.limits.max_entries {
            if entries > max {
                return Err(KvError::SizeLimitExceeded(format!(
                    "{entries} entries exceeds limit of {max}"
                )));
            }
        }
        if let Some(max) = self.limits.max_bytes {
            if bytes > max {
                return Err(KvError::SizeLimitExceeded(format!(
                    "{bytes} bytes exceeds limit of {max}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvClient for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, KvError> {
        self.check_batch(keys.len(), 0)?;
        let data = self.data.read();
        Ok(keys.iter().map(|k| data.get(k).cloned()).collect())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), KvError> {
        let bytes = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
        self.check_batch(entries.len(), bytes)?;
        let mut data = self.data.write();
        for (key, value) in entries {
            data.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// In-memory [`KvProvider`]: one [`MemoryKv`] per contract id, provisioned
/// lazily.
pub struct MemoryBackend {
    namespaces: Mutex<HashMap<String, Arc<MemoryKv>>>,
    limits: BatchLimits,
}

impl MemoryBackend {
    /// Creates a backend with unbounded batches.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(BatchLimits::unbounded())
    }

    /// Creates a backend whose namespaces enforce the given batch ceilings.
    #[must_use]
    pub fn with_limits(limits: BatchLimits) -> Self {
        Self {
            namespaces: Mutex::new(HashMap::new()),
            limits,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl KvProvider for MemoryBackend {
    fn namespace(&self, contract_id: &str) -> Arc<dyn KvClient> {
        let mut namespaces = self.namespaces.lock();
        let namespace = namespaces
            .entry(contract_id.to_string())
            .or_insert_with(|| Arc::new(MemoryKv::with_limits(self.limits)));
        Arc::clone(namespace) as Arc<dyn KvClient>
    }
}
