//! Identifier artifact: a JSON array of filenames, position-aligned with the index.

use crate::error::{Result, RetrievalError};
use std::fs;
use std::path::Path;

/// Write identifiers as a pretty-printed JSON array.
pub fn write(path: &Path, identifiers: &[String]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(identifiers)
        .map_err(|e| RetrievalError::SerializationError(e.to_string()))?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Order-sensitive CRC32 over the identifiers, stored in the index artifact
/// to tie the two files together.
pub fn digest(identifiers: &[String]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&(identifiers.len() as u64).to_le_bytes());
    for id in identifiers {
        hasher.update(&(id.len() as u64).to_le_bytes());
        hasher.update(id.as_bytes());
    }
    hasher.finalize()
}

/// Read an identifier array. Unreadable or malformed files are `CorruptArtifact`.
pub fn read(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| RetrievalError::corrupt(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| RetrievalError::corrupt(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip_preserves_order_and_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identifiers.json");
        let ids = vec!["b.jpg".to_string(), "a.jpg".to_string(), "b.jpg".to_string()];

        write(&path, &ids).unwrap();
        assert_eq!(read(&path).unwrap(), ids);
    }

    #[test]
    fn test_digest_depends_on_order() {
        let abc = vec!["a.jpg".to_string(), "b.jpg".to_string(), "c.jpg".to_string()];
        let cab = vec!["c.jpg".to_string(), "a.jpg".to_string(), "b.jpg".to_string()];
        assert_ne!(digest(&abc), digest(&cab));
    }

    #[test]
    fn test_digest_separates_boundaries() {
        let joined = vec!["ab".to_string(), "c".to_string()];
        let split = vec!["a".to_string(), "bc".to_string()];
        assert_ne!(digest(&joined), digest(&split));
    }

    #[test]
    fn test_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identifiers.json");
        fs::write(&path, b"{\"not\": \"an array\"}").unwrap();

        assert!(matches!(
            read(&path),
            Err(RetrievalError::CorruptArtifact { .. })
        ));
    }
}
