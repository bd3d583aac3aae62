//! Partition naming and entry key utilities.

use crate::types::{PartitionKind, PartitionSet};
use enchat_core::{Error, Result};
use sha2::{Digest, Sha256};

/// Name of a partition: `{prefix}-{kind}-{version}`.
pub fn partition_name(prefix: &str, kind: PartitionKind, version: &str) -> String {
    format!("{}-{}-{}", prefix, kind, version)
}

/// A partition is stale when the current version does not own it.
pub fn is_stale(name: &str, current: &PartitionSet) -> bool {
    !current.contains(name)
}

/// File name of an entry: hex SHA-256 of the request key.
pub fn entry_file_name(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    format!("{}.json", hex::encode(hash))
}

/// Reject partition names that could not name a directory of their own
/// under the cache root.
pub fn validate_partition_name(name: &str) -> Result<()> {
    let relative = name == "." || name == "..";
    let separators = name
        .chars()
        .any(|c| matches!(c, '/' | '\\') || c.is_control());
    if name.is_empty() || relative || separators {
        return Err(Error::InvalidRequest(format!(
            "invalid partition name: {:?}",
            name
        )));
    }
    Ok(())
}

/// Sanitize a partition name for use as a directory name.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_name() {
        assert_eq!(
            partition_name("enchat", PartitionKind::Static, "v1.0.0"),
            "enchat-static-v1.0.0"
        );
    }

    #[test]
    fn test_is_stale() {
        let current = PartitionSet::new("enchat", "v2");
        assert!(is_stale("enchat-static-v1", &current));
        assert!(is_stale("enchat-v1.0.0", &current));
        assert!(!is_stale("enchat-dynamic-v2", &current));
    }

    #[test]
    fn test_entry_file_name_is_stable() {
        let a = entry_file_name("GET http://localhost/index.html");
        let b = entry_file_name("GET http://localhost/index.html");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64 + ".json".len());
        assert_ne!(a, entry_file_name("GET http://localhost/"));
    }

    #[test]
    fn test_validate_partition_name() {
        assert!(validate_partition_name("enchat-static-v1.0.0").is_ok());
        assert!(validate_partition_name("enchat-v0.9.0").is_ok());

        for name in ["", ".", "..", "../cache", "a/b", "a\\b", "a\nb"] {
            let err = validate_partition_name(name).unwrap_err();
            assert!(matches!(err, Error::InvalidRequest(_)), "{name:?} was accepted");
        }
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("my/cache/key"), "my_cache_key");
        assert_eq!(sanitize_key("enchat-static-v1.0.0"), "enchat-static-v1.0.0");
    }
}
