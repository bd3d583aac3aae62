//! Versioned cache partitions for the EnChat offline gateway.
//!
//! A partition is a named key-value store from request identity to a
//! response snapshot. Partition names are derived from the version tag, so
//! a new deployment starts with empty partitions and the previous ones
//! become stale.

pub mod compression;
pub mod keys;
pub mod manager;
pub mod provider;
pub mod types;

pub use compression::{compress, decompress};
pub use keys::{entry_file_name, is_stale, partition_name, sanitize_key, validate_partition_name};
pub use manager::{CacheStoreManager, PartitionHandle};
pub use provider::{CacheStorage, FilesystemStorage, MemoryStorage, storage_from_config};
pub use types::{CacheHit, PartitionKind, PartitionSet, StoredEntry};
