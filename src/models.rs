//! Data models for watched documents and pipeline runs.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Document`]: a registered publication and the output of every stage so far
//! - [`DocumentStatus`]: the per-document state machine driving stage backlogs
//! - [`DocumentLink`]: a candidate file link scraped from a listing page
//! - [`RunRequest`] / [`PipelineSummary`]: input and output of one pipeline pass

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where a document stands in the pipeline.
///
/// Transitions only ever move one step to the right:
/// `Fetched -> Translated -> Analyzed -> Notified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Downloaded and registered, waiting for translation.
    Fetched,
    /// Translated text stored, waiting for analysis.
    Translated,
    /// Summary and keywords stored, waiting for notification.
    Analyzed,
    /// Notification delivered. Terminal.
    Notified,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Fetched => "fetched",
            DocumentStatus::Translated => "translated",
            DocumentStatus::Analyzed => "analyzed",
            DocumentStatus::Notified => "notified",
        }
    }

    /// The status a document moves to once its current stage succeeds.
    pub fn next(&self) -> Option<DocumentStatus> {
        match self {
            DocumentStatus::Fetched => Some(DocumentStatus::Translated),
            DocumentStatus::Translated => Some(DocumentStatus::Analyzed),
            DocumentStatus::Analyzed => Some(DocumentStatus::Notified),
            DocumentStatus::Notified => None,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetched" => Ok(DocumentStatus::Fetched),
            "translated" => Ok(DocumentStatus::Translated),
            "analyzed" => Ok(DocumentStatus::Analyzed),
            "notified" => Ok(DocumentStatus::Notified),
            other => Err(format!("unknown document status: {other}")),
        }
    }
}

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Translate,
    Analyze,
    Notify,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Fetch, Stage::Translate, Stage::Analyze, Stage::Notify];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Translate => "translate",
            Stage::Analyze => "analyze",
            Stage::Notify => "notify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered publication.
///
/// The stage columns (`translated_text`, `analysis_summary` +
/// `matched_keywords`, `notified_at`) are filled in left to right as the
/// document moves through [`DocumentStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    /// Source code of the authority that published the document (e.g. `BCL`).
    pub source: String,
    pub title: String,
    pub origin_url: String,
    /// Where the downloaded bytes live on disk.
    pub local_path: PathBuf,
    /// SHA-256 hex digest of the downloaded bytes.
    pub content_fingerprint: String,
    pub status: DocumentStatus,
    pub translated_text: Option<String>,
    pub analysis_summary: Option<String>,
    pub matched_keywords: Option<Vec<String>>,
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields the fetcher knows when it registers a new document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub source: String,
    pub title: String,
    pub origin_url: String,
    pub local_path: PathBuf,
    pub content_fingerprint: String,
}

/// A candidate file link found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    /// Absolute URL, resolved against the listing page.
    pub url: url::Url,
    pub title: String,
}

/// A regulator whose publications are watched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Short code identifying the authority (e.g. `ECB`).
    pub code: String,
    pub base_url: String,
    /// Page listing the authority's publications.
    pub docs_page: String,
}

/// Parameters of one pipeline pass. Omitted fields take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub sources: Vec<String>,
    pub target_language: String,
    pub extra_keywords: Vec<String>,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            sources: vec!["BCL".to_string()],
            target_language: "en".to_string(),
            extra_keywords: Vec::new(),
        }
    }
}

/// A source whose fetch failed during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Aggregate outcome of one pipeline pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub new_documents: usize,
    /// Newly registered documents, keyed by source code.
    pub per_source_counts: BTreeMap<String, usize>,
    pub failed_sources: Vec<SourceFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            DocumentStatus::Fetched,
            DocumentStatus::Translated,
            DocumentStatus::Analyzed,
            DocumentStatus::Notified,
        ] {
            assert_eq!(status.as_str().parse::<DocumentStatus>(), Ok(status));
        }
        assert!("deleted".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_status_moves_strictly_forward() {
        assert_eq!(DocumentStatus::Fetched.next(), Some(DocumentStatus::Translated));
        assert_eq!(DocumentStatus::Translated.next(), Some(DocumentStatus::Analyzed));
        assert_eq!(DocumentStatus::Analyzed.next(), Some(DocumentStatus::Notified));
        assert_eq!(DocumentStatus::Notified.next(), None);
    }

    #[test]
    fn test_run_request_deserialization_defaults_keywords() {
        let json = r#"{"sources": ["ECB"], "target_language": "fr"}"#;
        let req: RunRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.sources, vec!["ECB".to_string()]);
        assert_eq!(req.target_language, "fr");
        assert!(req.extra_keywords.is_empty());

        let empty: RunRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, RunRequest::default());
    }

    #[test]
    fn test_summary_serialization() {
        let mut summary = PipelineSummary::default();
        summary.new_documents = 2;
        summary.per_source_counts.insert("BCL".to_string(), 2);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"new_documents\":2"));
        assert!(json.contains("\"BCL\":2"));
    }
}
