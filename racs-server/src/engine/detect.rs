//! Build recipe change detection
//!
//! Keyed on the content of the build recipe alone: after a successful
//! pull the recipe is hashed and compared byte-equal against the stored
//! hash. A missing recipe is treated as the empty hash so the pipeline
//! continues.

use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::warn;

/// SHA-256 of the recipe file, or the empty hash when unreadable
pub async fn recipe_hash(path: &Path) -> Vec<u8> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Sha256::digest(&bytes).to_vec(),
        Err(err) => {
            warn!("Failed to read build recipe {}: {}", path.display(), err);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_recipe_is_empty_hash() {
        let dir = tempfile::tempdir().unwrap();
        assert!(recipe_hash(&dir.path().join("BuildSpec")).await.is_empty());
    }

    #[tokio::test]
    async fn test_hash_matches_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BuildSpec");
        std::fs::write(&path, b"FROM alpine\nRUN make\n").unwrap();

        let first = recipe_hash(&path).await;
        assert_eq!(first.len(), 32);
        assert_eq!(first, recipe_hash(&path).await);

        std::fs::write(&path, b"FROM alpine\nRUN make test\n").unwrap();
        assert_ne!(first, recipe_hash(&path).await);
    }
}
