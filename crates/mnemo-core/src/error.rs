//! Error types for `mnemo`.
//!
//! This module provides a unified error type for all engine operations.
//! Error codes follow the pattern `MNEMO-XXX` for easy debugging.

use crate::kv::KvError;
use thiserror::Error;

/// Result type alias for `mnemo` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `mnemo` operations.
///
/// Each variant includes a descriptive error message suitable for end-users.
#[derive(Error, Debug)]
pub enum Error {
    /// Vector dimension mismatch (MNEMO-001).
    ///
    /// Raised before any write when an insert or query vector does not match
    /// the index dimension.
    #[error("[MNEMO-001] Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Point not found (MNEMO-002).
    #[error("[MNEMO-002] Point with ID '{0}' not found")]
    PointNotFound(u32),

    /// Layer node not found (MNEMO-003).
    ///
    /// A point that should be linked at this layer has no adjacency record.
    #[error("[MNEMO-003] Layer node not found at layer {layer} for point {id}")]
    LayerNodeNotFound {
        /// Layer the adjacency record was expected in.
        layer: u32,
        /// Point whose record is missing.
        id: u32,
    },

    /// Stored data failed to decode (MNEMO-004).
    ///
    /// Indicates that a persisted record is truncated or malformed. The
    /// backing namespace may need repair.
    #[error("[MNEMO-004] Corrupted record: {0}")]
    Corrupted(String),

    /// Backend error (MNEMO-005).
    ///
    /// A key-value operation failed for a reason other than a batch size
    /// limit. Reads are safe to retry.
    #[error("[MNEMO-005] Backend error: {0}")]
    Backend(#[from] KvError),

    /// Configuration error (MNEMO-006).
    #[error("[MNEMO-006] Configuration error: {0}")]
    Config(String),

    /// Concurrent write detected (MNEMO-007).
    ///
    /// A global counter moved while an insert was in flight. Writers must be
    /// serialised per index; the index may need repair.
    #[error("[MNEMO-007] Concurrent write detected: {0}")]
    ConcurrentWrite(String),

    /// Metadata serialization error (MNEMO-008).
    #[error("[MNEMO-008] Metadata error: {0}")]
    Metadata(String),
}

impl Error {
    /// Returns the error code (e.g., "MNEMO-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DimensionMismatch { .. } => "MNEMO-001",
            Self::PointNotFound(_) => "MNEMO-002",
            Self::LayerNodeNotFound { .. } => "MNEMO-003",
            Self::Corrupted(_) => "MNEMO-004",
            Self::Backend(_) => "MNEMO-005",
            Self::Config(_) => "MNEMO-006",
            Self::ConcurrentWrite(_) => "MNEMO-007",
            Self::Metadata(_) => "MNEMO-008",
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// Non-recoverable errors indicate persistent-state damage (corrupted
    /// records, counter races) or a single record too large for the backend:
    /// a size limit only surfaces once bisection has reached one key, and
    /// retrying cannot shrink that key.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Corrupted(_)
                | Self::ConcurrentWrite(_)
                | Self::Backend(KvError::SizeLimitExceeded(_))
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Metadata(err.to_string())
    }
}
