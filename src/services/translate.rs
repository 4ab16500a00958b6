//! Translation backends and text chunking.
//!
//! Two backends implement [`Translate`]:
//! - [`ChatTranslator`]: prompts a language model to act as a legal translator
//! - [`LibreTranslateClient`]: a self-hosted LibreTranslate-compatible service

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::error::{Result, WatchError};
use crate::services::llm::{Complete, Prompt};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Translates a piece of text into a target language.
#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// [`Translate`] over a chat completion model.
pub struct ChatTranslator {
    completer: Arc<dyn Complete>,
}

impl ChatTranslator {
    pub fn new(completer: Arc<dyn Complete>) -> Self {
        Self { completer }
    }
}

#[async_trait]
impl Translate for ChatTranslator {
    #[instrument(level = "debug", skip_all, fields(%target_language, chars = text.chars().count()))]
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let prompt = Prompt {
            system: format!(
                "You are a professional legal translator. Translate the following regulatory text into {target_language}. \
                 Return only the translation."
            ),
            user: text.to_string(),
            temperature: 0.1,
        };
        self.completer.complete(&prompt).await
    }
}

#[derive(Serialize)]
struct LibreRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibreResponse {
    translated_text: String,
}

/// [`Translate`] over a LibreTranslate-compatible `POST /translate` endpoint.
#[derive(Debug, Clone)]
pub struct LibreTranslateClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl LibreTranslateClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WatchError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/translate", base_url.trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl Translate for LibreTranslateClient {
    #[instrument(level = "debug", skip_all, fields(%target_language, chars = text.chars().count()))]
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let body = LibreRequest {
            q: text,
            source: "auto",
            target: target_language,
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let res = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| WatchError::service("translation", e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(WatchError::service(
                "translation",
                format!("HTTP status {}", status.as_u16()),
            ));
        }

        let parsed: LibreResponse = res
            .json()
            .await
            .map_err(|e| WatchError::service("translation", format!("unreadable response: {e}")))?;
        Ok(parsed.translated_text)
    }
}

/// Split `text` into ordered, non-overlapping chunks of at most `max_chars`
/// characters whose concatenation is `text`.
///
/// A chunk ends after the last newline (or, failing that, whitespace) in its
/// window when that break falls in the window's second half; otherwise it is
/// cut at exactly `max_chars`.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let window_end = match rest.char_indices().nth(max_chars) {
            None => {
                chunks.push(rest);
                break;
            }
            Some((idx, _)) => idx,
        };
        let window = &rest[..window_end];
        let half = window.len() / 2;

        let cut = window
            .rfind('\n')
            .filter(|&i| i >= half)
            .or_else(|| {
                window
                    .char_indices()
                    .rev()
                    .find(|(i, c)| c.is_whitespace() && *i >= half)
                    .map(|(i, _)| i)
            })
            .map(|i| i + window[i..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(window_end);

        chunks.push(&rest[..cut]);
        rest = &rest[cut..];
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(split_into_chunks("hello", 10), vec!["hello"]);
        assert!(split_into_chunks("", 10).is_empty());
    }

    #[test]
    fn test_chunks_respect_limit_and_rejoin() {
        let text = "Article 1. Capital requirements apply.\nArticle 2. Liquidity coverage.\n".repeat(50);
        let chunks = split_into_chunks(&text, 100);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunks_prefer_line_breaks() {
        let text = format!("{}\n{}", "a".repeat(8), "b".repeat(8));
        let chunks = split_into_chunks(&text, 10);
        assert_eq!(chunks[0], format!("{}\n", "a".repeat(8)));
        assert_eq!(chunks[1], "b".repeat(8));
    }

    #[test]
    fn test_unbroken_text_is_cut_hard() {
        let text = "x".repeat(25);
        let chunks = split_into_chunks(&text, 10);
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![10, 10, 5]);
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let text = "é".repeat(25);
        let chunks = split_into_chunks(&text, 10);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    struct Echo;

    #[async_trait]
    impl Complete for Echo {
        async fn complete(&self, prompt: &Prompt) -> Result<String> {
            Ok(format!("{} | {}", prompt.system, prompt.user))
        }
    }

    #[tokio::test]
    async fn test_chat_translator_names_target_language() {
        let translator = ChatTranslator::new(Arc::new(Echo));
        let out = translator.translate("Bonjour", "de").await.unwrap();
        assert!(out.contains("into de"));
        assert!(out.ends_with("| Bonjour"));
    }

    #[test]
    fn test_libre_request_shape() {
        let body = LibreRequest {
            q: "Bonjour",
            source: "auto",
            target: "en",
            format: "text",
            api_key: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["q"], "Bonjour");
        assert_eq!(json["target"], "en");
        assert!(json.get("api_key").is_none());

        let parsed: LibreResponse = serde_json::from_str(r#"{"translatedText": "Hello"}"#).unwrap();
        assert_eq!(parsed.translated_text, "Hello");
    }
}
