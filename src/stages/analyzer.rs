//! Summarizes translated documents and tags them against a keyword vocabulary.
//!
//! The language model is asked for strict JSON:
//!
//! ```json
//! { "summary": "…", "matched_keywords": ["liquidity", "Basel"] }
//! ```
//!
//! Returned keywords are mapped back onto the vocabulary, so a document can
//! only ever be tagged with a term the caller asked about.

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, WatchError};
use crate::models::{Document, DocumentStatus};
use crate::services::{Complete, Prompt};
use crate::store::DocumentStore;
use crate::utils::{char_prefix, looks_truncated, truncate_for_log};

/// Default number of characters of translated text sent for analysis.
pub const DEFAULT_ANALYSIS_CHARS: usize = 12_000;

pub const DEFAULT_KEYWORDS: [&str; 7] = [
    "capital requirements",
    "liquidity",
    "Basel",
    "reporting",
    "leverage ratio",
    "credit risk",
    "operational risk",
];

/// Ordered, case-insensitively unique keyword list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    terms: Vec<String>,
}

impl Vocabulary {
    /// The built-in keywords followed by `extra`.
    pub fn with_extra(extra: &[String]) -> Self {
        Self::from_terms(
            DEFAULT_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .chain(extra.iter().cloned()),
        )
    }

    /// Trims each term, drops empties, and keeps the first spelling of
    /// terms that differ only by case.
    pub fn from_terms(terms: impl IntoIterator<Item = String>) -> Self {
        let mut kept: Vec<String> = Vec::new();
        for term in terms {
            let term = term.trim();
            let lowered = term.to_lowercase();
            if term.is_empty() || kept.iter().any(|k| k.to_lowercase() == lowered) {
                continue;
            }
            kept.push(term.to_string());
        }
        Self { terms: kept }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// The vocabulary spelling of `term`, if it is in the vocabulary.
    pub fn canonical(&self, term: &str) -> Option<&str> {
        let wanted = term.trim().to_lowercase();
        self.terms
            .iter()
            .find(|t| t.to_lowercase() == wanted)
            .map(String::as_str)
    }

    /// Restrict `returned` to vocabulary terms, in vocabulary spelling,
    /// without repeats. Returns `(kept, dropped)`.
    pub fn filter(&self, returned: &[String]) -> (Vec<String>, Vec<String>) {
        let mut kept: Vec<String> = Vec::new();
        let mut dropped = Vec::new();
        for term in returned {
            match self.canonical(term) {
                Some(canonical) => {
                    if !kept.iter().any(|k| k == canonical) {
                        kept.push(canonical.to_string());
                    }
                }
                None => dropped.push(term.clone()),
            }
        }
        (kept, dropped)
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    summary: String,
    matched_keywords: Vec<String>,
}

pub struct Analyzer<'a> {
    store: &'a DocumentStore,
    completer: &'a dyn Complete,
    vocabulary: Vocabulary,
    prefix_chars: usize,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        store: &'a DocumentStore,
        completer: &'a dyn Complete,
        vocabulary: Vocabulary,
        prefix_chars: usize,
    ) -> Self {
        Self {
            store,
            completer,
            vocabulary,
            prefix_chars,
        }
    }

    /// Analyze the `translated` backlog and return how many documents were
    /// analyzed. A document whose analysis fails is logged and left in the
    /// backlog; store failures end the run.
    #[instrument(level = "info", skip(self), fields(vocabulary = self.vocabulary.terms().len()))]
    pub async fn run(&self) -> Result<usize> {
        let docs = self.store.backlog(DocumentStatus::Translated).await?;
        info!(count = docs.len(), "Documents to analyze");

        let mut analyzed = 0usize;
        for doc in docs {
            let text = doc.translated_text.as_deref().unwrap_or_default();
            if text.trim().is_empty() {
                warn!(id = doc.id, "No translated text; skipping");
                continue;
            }

            let response = match self.analyze(&doc, text).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(id = doc.id, error = %e, "Analysis failed; document stays in backlog");
                    continue;
                }
            };

            let (keywords, dropped) = self.vocabulary.filter(&response.matched_keywords);
            if !dropped.is_empty() {
                warn!(id = doc.id, ?dropped, "Dropped keywords outside the vocabulary");
            }

            self.store
                .record_analysis(doc.id, response.summary.trim(), &keywords)
                .await?;
            analyzed += 1;
            info!(id = doc.id, ?keywords, "Analyzed document");
        }
        Ok(analyzed)
    }

    fn prompt(&self, text: &str) -> Prompt {
        let keywords = self.vocabulary.terms().join(", ");
        let instructions = format!(
            "You are a regulatory expert. Analyze the following translated regulatory document.\n\n\
             1. Provide a concise summary (max 10 lines).\n\
             2. Identify which of these keywords are clearly relevant in the document: {keywords}.\n\
             3. Do NOT hallucinate; only select a keyword if the topic is actually present.\n\n\
             Return JSON with:\n\
             - \"summary\": string\n\
             - \"matched_keywords\": list of strings"
        );
        Prompt {
            system: "You output only valid JSON.".to_string(),
            user: format!(
                "{instructions}\n\nDocument:\n{}",
                char_prefix(text, self.prefix_chars)
            ),
            temperature: 0.1,
        }
    }

    /// Ask once, and once more if the reply looks cut off mid-JSON.
    async fn analyze(&self, doc: &Document, text: &str) -> Result<AnalysisResponse> {
        let prompt = self.prompt(text);
        let mut asked_again = false;

        loop {
            let reply = self.completer.complete(&prompt).await?;
            debug!(id = doc.id, reply = %truncate_for_log(&reply, 200), "Analysis reply");

            match parse_response(&reply) {
                Ok(response) => return Ok(response),
                Err(e) if looks_truncated(&e) && !asked_again => {
                    warn!(id = doc.id, error = %e, "Analysis reply looks truncated; asking again");
                    asked_again = true;
                }
                Err(e) => {
                    return Err(WatchError::MalformedResponse(format!(
                        "{e}; reply: {}",
                        truncate_for_log(&reply, 200)
                    )));
                }
            }
        }
    }
}

fn parse_response(reply: &str) -> std::result::Result<AnalysisResponse, serde_json::Error> {
    serde_json::from_str(strip_code_fence(reply))
}

/// Remove a surrounding Markdown code fence (with optional info string).
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
