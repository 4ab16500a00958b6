//! Plain-text extraction from stored documents.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::error::{Result, WatchError};

/// Pulls plain text out of a stored document.
#[async_trait]
pub trait ExtractText: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String>;
}

/// Extracts PDFs page by page (pages joined with `"\n"`); any other file is
/// read as lossy UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTextExtractor;

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn extract_pdf(path: PathBuf) -> Result<String> {
    let pages = pdf_extract::extract_text_by_pages(&path).map_err(|e| {
        WatchError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("failed to extract text from {}: {e}", path.display()),
        ))
    })?;
    debug!(pages = pages.len(), "Extracted PDF pages");
    Ok(pages.join("\n"))
}

#[async_trait]
impl ExtractText for FileTextExtractor {
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    async fn extract(&self, path: &Path) -> Result<String> {
        if is_pdf(path) {
            let owned = path.to_path_buf();
            // pdf parsing is CPU-bound
            tokio::task::spawn_blocking(move || extract_pdf(owned))
                .await
                .map_err(|e| WatchError::Io(std::io::Error::other(e)))?
        } else {
            let bytes = tokio::fs::read(path).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}
