//! Source registry and service wiring.
//!
//! The registry maps a source code to the regulator it stands for. Three
//! regulators are built in; a YAML file can replace them:
//!
//! ```yaml
//! - code: BCL
//!   base_url: https://www.bcl.lu
//!   docs_page: https://www.bcl.lu/en/Media-and-publications/Legal-powers/index.html
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::cli::GlobalArgs;
use crate::error::{Result, WatchError};
use crate::models::Source;
use crate::pipeline::{Pipeline, PipelineSettings, Services};
use crate::services::extract::FileTextExtractor;
use crate::services::http::HttpRetriever;
use crate::services::llm::{ChatClient, RetryComplete};
use crate::services::mail::{SmtpMailer, SmtpSettings, UnconfiguredMailer};
use crate::services::translate::{ChatTranslator, LibreTranslateClient};
use crate::services::{Complete, Deliver, Translate};
use crate::storage::FileStore;
use crate::store::DocumentStore;

const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// The regulators a run may name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    pub fn builtin() -> Self {
        let source = |code: &str, base_url: &str, docs_page: &str| Source {
            code: code.to_string(),
            base_url: base_url.to_string(),
            docs_page: docs_page.to_string(),
        };
        Self::new(vec![
            source(
                "BCL",
                "https://www.bcl.lu",
                "https://www.bcl.lu/en/Media-and-publications/Legal-powers/index.html",
            ),
            source(
                "ECB",
                "https://www.ecb.europa.eu",
                "https://www.ecb.europa.eu/pub/legal/html/index.en.html",
            ),
            source(
                "BDF",
                "https://www.banque-france.fr",
                "https://www.banque-france.fr/la-banque-de-france/communiques",
            ),
        ])
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let sources: Vec<Source> = serde_yaml::from_str(yaml)?;
        if sources.is_empty() {
            return Err(WatchError::Config("sources file lists no sources".to_string()));
        }
        if let Some(dup) = sources
            .iter()
            .enumerate()
            .find(|(i, s)| sources[..*i].iter().any(|o| o.code == s.code))
            .map(|(_, s)| s.code.clone())
        {
            return Err(WatchError::Config(format!("duplicate source code {dup:?}")));
        }
        Ok(Self::new(sources))
    }

    #[instrument(level = "info", fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path).await?;
        let registry = Self::from_yaml(&yaml)?;
        info!(count = registry.sources.len(), "Loaded source registry");
        Ok(registry)
    }

    pub fn get(&self, code: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.code == code)
    }

    pub fn codes(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.code.as_str()).collect()
    }

    /// Look every code up, failing on the first unknown one.
    pub fn resolve(&self, codes: &[String]) -> Result<Vec<Source>> {
        codes
            .iter()
            .map(|code| {
                self.get(code)
                    .cloned()
                    .ok_or_else(|| WatchError::UnknownSource(code.clone()))
            })
            .collect()
    }
}

/// Translation service selected with `--translator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TranslatorBackend {
    /// Legal-translator prompt over the completion endpoint
    Chat,
    /// LibreTranslate-compatible `POST /translate`
    Libre,
}

impl GlobalArgs {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("metadata.db")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    fn smtp_settings(&self) -> Option<SmtpSettings> {
        let host = self.smtp_host.as_deref().filter(|h| !h.trim().is_empty())?;
        Some(SmtpSettings {
            host: host.to_string(),
            port: self.smtp_port,
            username: self.smtp_username.clone().unwrap_or_default(),
            password: self.smtp_password.clone().unwrap_or_default(),
            from: self.email_from.clone().unwrap_or_default(),
        })
    }
}

/// Build the production services described by `args`.
pub fn build_services(args: &GlobalArgs) -> Result<Services> {
    let chat = ChatClient::new(
        &args.llm_base_url,
        args.llm_api_key.as_deref().unwrap_or_default(),
        &args.llm_model,
    )?;
    let completer: Arc<dyn Complete> = if args.llm_retries == 0 {
        Arc::new(chat)
    } else {
        Arc::new(RetryComplete::new(chat, args.llm_retries, RETRY_BASE_DELAY))
    };

    let translator: Arc<dyn Translate> = match args.translator {
        TranslatorBackend::Chat => Arc::new(ChatTranslator::new(Arc::clone(&completer))),
        TranslatorBackend::Libre => {
            let url = args.libretranslate_url.as_deref().ok_or_else(|| {
                WatchError::Config("--translator libre requires LIBRETRANSLATE_URL".to_string())
            })?;
            Arc::new(LibreTranslateClient::new(url, args.libretranslate_api_key.clone())?)
        }
    };

    let mailer: Arc<dyn Deliver> = match args.smtp_settings() {
        Some(settings) => Arc::new(SmtpMailer::new(&settings)?),
        None => {
            warn!("Email SMTP host not configured; notifications will fail until EMAIL_SMTP_HOST is set");
            Arc::new(UnconfiguredMailer)
        }
    };

    Ok(Services {
        retriever: Arc::new(HttpRetriever::new()?),
        extractor: Arc::new(FileTextExtractor),
        translator,
        completer,
        mailer,
    })
}

/// Open the store, load the registry and wire the services.
#[instrument(level = "info", skip_all, fields(data_dir = %args.data_dir.display()))]
pub async fn build_pipeline(args: &GlobalArgs) -> Result<Pipeline> {
    let registry = match &args.sources_file {
        Some(path) => SourceRegistry::load(path).await?,
        None => SourceRegistry::builtin(),
    };
    let store = DocumentStore::open(&args.db_path()).await?;
    let files = FileStore::new(args.documents_dir());

    let settings = PipelineSettings {
        extensions: args.extensions.clone(),
        chunk_chars: args.chunk_chars,
        analysis_chars: args.analysis_chars,
        recipient: args.email_to.clone().unwrap_or_default(),
        product_name: args.product_name.clone(),
    };
    if settings.recipient.is_empty() {
        warn!("EMAIL_TO is not set; notifications cannot be addressed");
    }

    Ok(Pipeline::new(store, files, build_services(args)?, registry, settings))
}
