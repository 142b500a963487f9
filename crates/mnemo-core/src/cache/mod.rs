//! In-process caching.
//!
//! The graph store may keep recently read adjacency records in an LRU so
//! repeated traversals of the same region skip the backend. Entries are
//! refreshed on every write-through; the persisted namespace stays the only
//! source of truth.

mod lru;

pub use lru::{CacheStats, LruCache};
