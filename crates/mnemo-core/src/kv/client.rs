//! Backend client traits and error type.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a key-value backend.
#[derive(Error, Debug, Clone)]
pub enum KvError {
    /// The backend rejected a batch for exceeding its per-transaction
    /// payload bound. Recovered locally by adaptive splitting; a single-key
    /// operation hitting this limit is unrecoverable and propagates.
    #[error("batch exceeds backend size limit: {0}")]
    SizeLimitExceeded(String),

    /// Transient failure: network, timeout, rate limit. Reads are safe to
    /// retry.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The namespace is unreachable or was never provisioned.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A string-valued key-value namespace.
///
/// One instance is bound to exactly one contract namespace. The backend
/// guarantees single-key atomicity and nothing more; batch operations may be
/// rejected wholesale with [`KvError::SizeLimitExceeded`].
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Reads a single key. Absent keys yield `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Reads a batch of keys. The result preserves input order and length;
    /// absent keys yield `None`, never errors.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, KvError>;

    /// Writes a single key.
    async fn set(&self, key: &str, value: String) -> Result<(), KvError>;

    /// Writes a batch of keys. All-or-nothing semantics are not guaranteed.
    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), KvError>;
}

/// Factory for per-contract namespaces.
///
/// Created once at process start and handed to [`MemoryStore`]; replaces the
/// backend singleton with an explicit context object.
///
/// [`MemoryStore`]: crate::MemoryStore
pub trait KvProvider: Send + Sync {
    /// Returns the namespace for the given contract id, provisioning an
    /// empty one if it does not exist yet.
    fn namespace(&self, contract_id: &str) -> Arc<dyn KvClient>;
}
