//! Content-addressed storage for downloaded publications.
//!
//! Files live at `<root>/<source>/<fingerprint>.<ext>`. Naming by
//! fingerprint makes a re-download of identical bytes land on the same path.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::utils::sanitize_component;

/// SHA-256 of `bytes` as lowercase hex.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Root of the on-disk document tree.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a document with this fingerprint would be stored at.
    pub fn path_for(&self, source: &str, fingerprint: &str, extension: &str) -> PathBuf {
        let ext = sanitize_component(extension.trim_start_matches('.')).to_lowercase();
        let file_name = if ext.is_empty() {
            fingerprint.to_string()
        } else {
            format!("{fingerprint}.{ext}")
        };
        self.root.join(sanitize_component(source)).join(file_name)
    }

    /// Write `bytes` under the source's namespace and return the path.
    #[instrument(level = "debug", skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn save(
        &self,
        source: &str,
        fingerprint: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let path = self.path_for(source, fingerprint, extension);
        if let Some(folder) = path.parent() {
            fs::create_dir_all(folder).await?;
        }
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), "Saved document bytes");
        Ok(path)
    }
}
