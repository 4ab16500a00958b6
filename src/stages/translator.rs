//! Translates the text of every `fetched` document.

use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::DocumentStatus;
use crate::services::translate::split_into_chunks;
use crate::services::{ExtractText, Translate};
use crate::store::DocumentStore;

/// Default chunk size, in characters, for one translation call.
pub const DEFAULT_CHUNK_CHARS: usize = 6000;

pub struct Translator<'a> {
    store: &'a DocumentStore,
    extractor: &'a dyn ExtractText,
    translator: &'a dyn Translate,
    chunk_chars: usize,
}

impl<'a> Translator<'a> {
    pub fn new(
        store: &'a DocumentStore,
        extractor: &'a dyn ExtractText,
        translator: &'a dyn Translate,
        chunk_chars: usize,
    ) -> Self {
        Self {
            store,
            extractor,
            translator,
            chunk_chars,
        }
    }

    /// Translate the backlog into `target_language` and return how many
    /// documents were translated.
    ///
    /// Documents without extractable text, or whose translation comes back
    /// empty, stay `fetched` and are retried on the next run.
    #[instrument(level = "info", skip(self))]
    pub async fn run(&self, target_language: &str) -> Result<usize> {
        let docs = self.store.backlog(DocumentStatus::Fetched).await?;
        info!(count = docs.len(), "Documents to translate");

        let mut translated = 0usize;
        for doc in docs {
            let text = match self.extractor.extract(&doc.local_path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(id = doc.id, error = %e, "Text extraction failed; skipping");
                    continue;
                }
            };
            if text.trim().is_empty() {
                warn!(id = doc.id, "No text extracted; skipping");
                continue;
            }

            let output = self.translate_text(doc.id, &text, target_language).await;
            if output.trim().is_empty() {
                warn!(id = doc.id, "Translation came back empty; skipping");
                continue;
            }

            self.store.record_translation(doc.id, &output).await?;
            translated += 1;
            info!(id = doc.id, chars = output.chars().count(), "Translated document");
        }
        Ok(translated)
    }

    /// Translate chunk by chunk. A failed chunk contributes an empty string.
    async fn translate_text(&self, id: i64, text: &str, target_language: &str) -> String {
        let chunks = split_into_chunks(text, self.chunk_chars);
        let total = chunks.len();
        let mut parts = Vec::with_capacity(total);

        for (index, chunk) in chunks.into_iter().enumerate() {
            match self.translator.translate(chunk, target_language).await {
                Ok(part) => parts.push(part),
                Err(e) => {
                    warn!(id, chunk = index + 1, total, error = %e, "Chunk translation failed");
                    parts.push(String::new());
                }
            }
        }
        parts.join("\n")
    }
}
