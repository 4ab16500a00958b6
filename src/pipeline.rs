//! The driver: one pass of fetch, translate, analyze, notify.
//!
//! ```text
//! for source in request.sources:  Fetcher      (failures recorded, run continues)
//! once:                           Translator   (per-document failures skipped)
//! once:                           Analyzer     (per-document failures skipped)
//! once:                           Notifier     (first delivery failure aborts)
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::config::SourceRegistry;
use crate::error::Result;
use crate::events::{PhaseEvent, PipelineObserver};
use crate::models::{PipelineSummary, RunRequest, SourceFailure, Stage};
use crate::services::{Complete, Deliver, ExtractText, Retrieve, Translate};
use crate::stages::analyzer::DEFAULT_ANALYSIS_CHARS;
use crate::stages::translator::DEFAULT_CHUNK_CHARS;
use crate::stages::{Analyzer, Fetcher, Notifier, Translator, Vocabulary};
use crate::storage::FileStore;
use crate::store::DocumentStore;

/// The external capabilities a pass uses.
#[derive(Clone)]
pub struct Services {
    pub retriever: Arc<dyn Retrieve>,
    pub extractor: Arc<dyn ExtractText>,
    pub translator: Arc<dyn Translate>,
    pub completer: Arc<dyn Complete>,
    pub mailer: Arc<dyn Deliver>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// File extensions that count as documents on a listing page.
    pub extensions: Vec<String>,
    pub chunk_chars: usize,
    /// Prefix of the translated text sent for analysis, in characters.
    pub analysis_chars: usize,
    /// The single notification recipient.
    pub recipient: String,
    /// Shown in notification subjects and signatures.
    pub product_name: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            extensions: vec![".pdf".to_string()],
            chunk_chars: DEFAULT_CHUNK_CHARS,
            analysis_chars: DEFAULT_ANALYSIS_CHARS,
            recipient: String::new(),
            product_name: "RegWatch".to_string(),
        }
    }
}

pub struct Pipeline {
    store: DocumentStore,
    files: FileStore,
    services: Services,
    registry: SourceRegistry,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        store: DocumentStore,
        files: FileStore,
        services: Services,
        registry: SourceRegistry,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            files,
            services,
            registry,
            settings,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run one full pass.
    ///
    /// Unknown source codes fail before any work starts. A source whose
    /// fetch fails is recorded in `failed_sources` and the pass goes on; a
    /// delivery failure or a store failure ends the pass with that error.
    #[instrument(level = "info", skip_all, fields(sources = ?request.sources, lang = %request.target_language))]
    pub async fn run_pipeline(
        &self,
        request: &RunRequest,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineSummary> {
        let sources = self.registry.resolve(&request.sources)?;
        let run_t0 = Instant::now();
        info!("Pipeline run starting");

        let mut summary = PipelineSummary::default();
        let retriever = self.services.retriever.as_ref();
        let fetcher = Fetcher::new(&self.store, &self.files, retriever, &self.settings.extensions);

        observed(observer, Stage::Fetch, async {
            for source in &sources {
                let count = match fetcher.run(source).await {
                    Ok(count) => count,
                    Err(e) => {
                        error!(source = %source.code, error = %e, "Fetch failed; continuing with other sources");
                        summary.failed_sources.push(SourceFailure {
                            source: source.code.clone(),
                            error: e.to_string(),
                        });
                        0
                    }
                };
                *summary.per_source_counts.entry(source.code.clone()).or_insert(0) += count;
                summary.new_documents += count;
            }
        })
        .await;

        let translator = Translator::new(
            &self.store,
            self.services.extractor.as_ref(),
            self.services.translator.as_ref(),
            self.settings.chunk_chars,
        );
        observed(observer, Stage::Translate, translator.run(&request.target_language)).await?;

        let analyzer = Analyzer::new(
            &self.store,
            self.services.completer.as_ref(),
            Vocabulary::with_extra(&request.extra_keywords),
            self.settings.analysis_chars,
        );
        observed(observer, Stage::Analyze, analyzer.run()).await?;

        let notifier = Notifier::new(
            &self.store,
            self.services.mailer.as_ref(),
            &self.settings.recipient,
            &self.settings.product_name,
        );
        observed(observer, Stage::Notify, notifier.run()).await?;

        info!(
            new_documents = summary.new_documents,
            failed_sources = summary.failed_sources.len(),
            elapsed_ms = run_t0.elapsed().as_millis(),
            "Pipeline run finished"
        );
        Ok(summary)
    }
}

/// Bracket `stage` with `Started`/`Finished` events.
async fn observed<F: Future>(observer: &dyn PipelineObserver, stage: Stage, work: F) -> F::Output {
    observer.on_event(&PhaseEvent::Started { stage });
    let t0 = Instant::now();
    let output = work.await;
    observer.on_event(&PhaseEvent::Finished {
        stage,
        elapsed: t0.elapsed(),
    });
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;
    use crate::events::CollectingObserver;
    use crate::models::{DocumentStatus, Source};
    use crate::testing::{FakeCompleter, FakeExtractor, FakeRetriever, FakeTranslator, RecordingMailer};

    const GOOD_PAGE: &str = "https://good.example.com/docs";
    const BAD_PAGE: &str = "https://bad.example.com/docs";

    fn registry() -> SourceRegistry {
        SourceRegistry::new(vec![
            Source {
                code: "GOOD".to_string(),
                base_url: "https://good.example.com".to_string(),
                docs_page: GOOD_PAGE.to_string(),
            },
            Source {
                code: "BAD".to_string(),
                base_url: "https://bad.example.com".to_string(),
                docs_page: BAD_PAGE.to_string(),
            },
        ])
    }

    struct Harness {
        _dir: tempfile::TempDir,
        pipeline: Pipeline,
        mailer: Arc<RecordingMailer>,
        completer: Arc<FakeCompleter>,
    }

    async fn harness(mailer: RecordingMailer) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&dir.path().join("metadata.db")).await.unwrap();
        let files = FileStore::new(dir.path().join("documents"));

        let retriever = FakeRetriever::default()
            .with_page(GOOD_PAGE, r#"<a href="/files/liquidity.pdf">Liquidity circular</a>"#)
            .with_file("https://good.example.com/files/liquidity.pdf", b"liquidity rules");
        let completer = Arc::new(FakeCompleter::replying([
            r#"{"summary": "Liquidity rules.", "matched_keywords": ["liquidity"]}"#,
        ]));
        let mailer = Arc::new(mailer);

        let services = Services {
            retriever: Arc::new(retriever),
            extractor: Arc::new(FakeExtractor),
            translator: Arc::new(FakeTranslator::default()),
            completer: completer.clone(),
            mailer: mailer.clone(),
        };
        let settings = PipelineSettings {
            recipient: "ops@example.com".to_string(),
            ..PipelineSettings::default()
        };
        Harness {
            pipeline: Pipeline::new(store, files, services, registry(), settings),
            _dir: dir,
            mailer,
            completer,
        }
    }

    fn request(sources: &[&str]) -> RunRequest {
        RunRequest {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            ..RunRequest::default()
        }
    }

    #[tokio::test]
    async fn test_failing_source_does_not_stop_the_run() {
        let h = harness(RecordingMailer::default()).await;
        let summary = h
            .pipeline
            .run_pipeline(&request(&["BAD", "GOOD"]), &())
            .await
            .unwrap();

        assert_eq!(summary.new_documents, 1);
        assert_eq!(summary.per_source_counts.get("GOOD"), Some(&1));
        assert_eq!(summary.per_source_counts.get("BAD"), Some(&0));
        assert_eq!(summary.failed_sources.len(), 1);
        assert_eq!(summary.failed_sources[0].source, "BAD");

        let docs = h.pipeline.store().recent(10).await.unwrap();
        assert_eq!(docs[0].status, DocumentStatus::Notified);
        assert_eq!(h.mailer.sent().len(), 1);
        assert_eq!(h.completer.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_source_fails_before_any_work() {
        let h = harness(RecordingMailer::default()).await;
        let observer = CollectingObserver::default();
        let err = h
            .pipeline
            .run_pipeline(&request(&["GOOD", "NOPE"]), &observer)
            .await
            .unwrap_err();

        assert!(matches!(err, WatchError::UnknownSource(code) if code == "NOPE"));
        assert!(observer.events().is_empty());
        assert!(h.pipeline.store().recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let h = harness(RecordingMailer::default()).await;
        let observer = CollectingObserver::default();
        h.pipeline
            .run_pipeline(&request(&["GOOD"]), &observer)
            .await
            .unwrap();

        let started: Vec<Stage> = observer
            .events()
            .into_iter()
            .filter_map(|e| match e {
                PhaseEvent::Started { stage } => Some(stage),
                PhaseEvent::Finished { .. } => None,
            })
            .collect();
        assert_eq!(started, Stage::ALL.to_vec());
        assert_eq!(observer.events().len(), 8);
    }

    #[tokio::test]
    async fn test_delivery_failure_aborts_the_run() {
        let h = harness(RecordingMailer::failing()).await;
        let observer = CollectingObserver::default();
        let err = h
            .pipeline
            .run_pipeline(&request(&["GOOD"]), &observer)
            .await
            .unwrap_err();

        assert!(matches!(err, WatchError::Delivery(_)));
        let docs = h.pipeline.store().recent(10).await.unwrap();
        assert_eq!(docs[0].status, DocumentStatus::Analyzed);
        // notify still reports its end
        assert!(matches!(
            observer.events().last(),
            Some(PhaseEvent::Finished { stage: Stage::Notify, .. })
        ));
    }
}
