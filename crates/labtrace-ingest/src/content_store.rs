//! Content-addressed artifact storage (§9): `sha256(bytes)` fans out into a
//! two-level directory prefix so no single directory accumulates millions
//! of entries. The report row records only the path and mime type, never
//! the bytes.

use std::path::{Path, PathBuf};

use crate::error::{IngestError, Result};

pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, checksum: &str) -> PathBuf {
        let (prefix, rest) = checksum.split_at(4.min(checksum.len()));
        self.root.join(&prefix[..2.min(prefix.len())]).join(&prefix[2.min(prefix.len())..]).join(rest)
    }

    pub async fn store(&self, checksum: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_for(checksum);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IngestError::Store(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| IngestError::Store(e.to_string()))?;
        Ok(path.to_string_lossy().to_string())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_for_shards_by_prefix() {
        let store = ContentStore::new("/data/artifacts");
        let path = store.path_for("abcdef0123");
        assert_eq!(path, PathBuf::from("/data/artifacts/ab/cd/ef0123"));
    }
}
