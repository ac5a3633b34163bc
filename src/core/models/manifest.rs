use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::{LoftError, Result};

/// File name of the transfer manifest at the root of a synced remote.
pub const MANIFEST_FILE: &str = "last_synced.toml";

/// Record written at a remote's root after each successful sync.
///
/// Its presence is the proof that the last transfer completed; recovery
/// only checks that it exists and when it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferManifest {
    pub repository: String,
    pub backend: String,
    pub remote: String,
    pub synced_at: DateTime<Utc>,
    pub files: u64,
    pub bytes: u64,
    /// SHA-256 over the sorted `path\0size` listing of transferred files.
    pub digest: String,
}

impl TransferManifest {
    /// Digest of a file listing, independent of listing order.
    pub fn digest_listing(listing: &[(PathBuf, u64)]) -> String {
        let mut sorted: Vec<&(PathBuf, u64)> = listing.iter().collect();
        sorted.sort();
        let mut hasher = Sha256::new();
        for (path, size) in sorted {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(size.to_string().as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| LoftError::Manifest {
            path: PathBuf::from(MANIFEST_FILE),
            detail: format!("cannot serialize: {e}"),
        })
    }

    /// Write the manifest into `dir`, replacing any previous one atomically.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let content = self.to_toml()?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&path).map_err(|e| LoftError::Manifest {
            path: path.clone(),
            detail: format!("cannot persist: {e}"),
        })?;
        Ok(path)
    }

    /// Read the manifest from `dir`, if one is there.
    pub fn read_from(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let manifest = toml::from_str(&content).map_err(|e| LoftError::Manifest {
            path: path.clone(),
            detail: format!("cannot parse: {e}"),
        })?;
        Ok(Some(manifest))
    }
}
