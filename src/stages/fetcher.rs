//! Discovers and registers new publications for one source.

use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{Result, WatchError};
use crate::models::{NewDocument, Source};
use crate::scrapers::links::{extract_document_links, link_extension};
use crate::services::Retrieve;
use crate::storage::{FileStore, fingerprint};
use crate::store::DocumentStore;

pub struct Fetcher<'a> {
    store: &'a DocumentStore,
    files: &'a FileStore,
    retriever: &'a dyn Retrieve,
    extensions: &'a [String],
}

impl<'a> Fetcher<'a> {
    pub fn new(
        store: &'a DocumentStore,
        files: &'a FileStore,
        retriever: &'a dyn Retrieve,
        extensions: &'a [String],
    ) -> Self {
        Self {
            store,
            files,
            retriever,
            extensions,
        }
    }

    /// Scrape `source`'s listing page, download every linked document and
    /// register the ones whose fingerprint is new for this source.
    ///
    /// Returns the number of newly registered documents. Any retrieval
    /// failure ends the source's run.
    #[instrument(level = "info", skip(self), fields(source = %source.code))]
    pub async fn run(&self, source: &Source) -> Result<usize> {
        let page_url = Url::parse(&source.docs_page)
            .map_err(|e| WatchError::retrieval(source.docs_page.as_str(), e))?;

        let html = self.retriever.get_page(&page_url).await?;
        let links = extract_document_links(&html, &page_url, self.extensions);

        let mut inserted = 0usize;
        for link in links {
            let bytes = self.retriever.get_bytes(&link.url).await?;
            let fp = fingerprint(&bytes);

            if self.store.find_by_fingerprint(&source.code, &fp).await?.is_some() {
                debug!(url = %link.url, fingerprint = %fp, "Already registered; skipping");
                continue;
            }

            let ext = match link_extension(&link.url) {
                ext if ext.is_empty() => self.default_extension(),
                ext => ext,
            };
            let local_path = self.files.save(&source.code, &fp, &ext, &bytes).await?;

            let new_doc = NewDocument {
                source: source.code.clone(),
                title: link.title,
                origin_url: link.url.to_string(),
                local_path,
                content_fingerprint: fp,
            };
            if let Some(id) = self.store.insert(&new_doc).await? {
                inserted += 1;
                info!(id, title = %new_doc.title, url = %new_doc.origin_url, "Registered new document");
            }
        }

        info!(count = inserted, "Fetch finished");
        Ok(inserted)
    }

    fn default_extension(&self) -> String {
        self.extensions
            .first()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .unwrap_or_else(|| "pdf".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;
    use crate::testing::FakeRetriever;

    const PAGE: &str = "https://regulator.example.com/publications/index.html";

    fn source() -> Source {
        Source {
            code: "X".to_string(),
            base_url: "https://regulator.example.com".to_string(),
            docs_page: PAGE.to_string(),
        }
    }

    fn pdf() -> Vec<String> {
        vec![".pdf".to_string()]
    }

    async fn setup() -> (tempfile::TempDir, DocumentStore, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&dir.path().join("metadata.db")).await.unwrap();
        let files = FileStore::new(dir.path().join("documents"));
        (dir, store, files)
    }

    #[tokio::test]
    async fn test_second_run_on_unchanged_page_registers_nothing() {
        let (_dir, store, files) = setup().await;
        let retriever = FakeRetriever::default()
            .with_page(PAGE, r#"<a href="report.pdf">Quarterly report</a>"#)
            .with_file("https://regulator.example.com/publications/report.pdf", b"report bytes");
        let exts = pdf();
        let fetcher = Fetcher::new(&store, &files, &retriever, &exts);

        assert_eq!(fetcher.run(&source()).await.unwrap(), 1);
        assert_eq!(fetcher.run(&source()).await.unwrap(), 0);

        let docs = store.recent(10).await.unwrap();
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.status, DocumentStatus::Fetched);
        assert_eq!(doc.title, "Quarterly report");
        assert!(doc.translated_text.is_none());
        assert!(doc.local_path.ends_with(format!("X/{}.pdf", fingerprint(b"report bytes"))));
        assert!(doc.local_path.exists());
    }

    #[tokio::test]
    async fn test_identical_bytes_under_different_urls_are_one_document() {
        let (_dir, store, files) = setup().await;
        let retriever = FakeRetriever::default()
            .with_page(PAGE, r#"<a href="a.pdf">A</a><a href="/mirror/b.pdf">B</a>"#)
            .with_file("https://regulator.example.com/publications/a.pdf", b"same")
            .with_file("https://regulator.example.com/mirror/b.pdf", b"same");
        let exts = pdf();
        let fetcher = Fetcher::new(&store, &files, &retriever, &exts);

        assert_eq!(fetcher.run(&source()).await.unwrap(), 1);
        assert_eq!(store.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_changed_bytes_register_a_new_document() {
        let (_dir, store, files) = setup().await;
        let url = "https://regulator.example.com/publications/a.pdf";
        let retriever = FakeRetriever::default()
            .with_page(PAGE, r#"<a href="a.pdf">A</a>"#)
            .with_file(url, b"v1");
        let exts = pdf();
        assert_eq!(
            Fetcher::new(&store, &files, &retriever, &exts).run(&source()).await.unwrap(),
            1
        );

        let retriever = retriever.with_file(url, b"v2");
        assert_eq!(
            Fetcher::new(&store, &files, &retriever, &exts).run(&source()).await.unwrap(),
            1
        );
        assert_eq!(store.recent(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_listing_page_is_a_retrieval_error() {
        let (_dir, store, files) = setup().await;
        let retriever = FakeRetriever::default();
        let exts = pdf();
        let err = Fetcher::new(&store, &files, &retriever, &exts)
            .run(&source())
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::Retrieval { .. }));
    }

    #[tokio::test]
    async fn test_failed_download_aborts_the_source() {
        let (_dir, store, files) = setup().await;
        let retriever = FakeRetriever::default()
            .with_page(PAGE, r#"<a href="missing.pdf">Gone</a>"#);
        let exts = pdf();
        let err = Fetcher::new(&store, &files, &retriever, &exts)
            .run(&source())
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::Retrieval { .. }));
        assert!(store.recent(10).await.unwrap().is_empty());
    }
}
