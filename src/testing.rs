//! In-crate fakes for the service traits, shared by the unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use url::Url;

use crate::error::{Result, WatchError};
use crate::services::{Complete, Deliver, ExtractText, OutgoingMessage, Prompt, Retrieve, Translate};

/// Serves canned pages and files; anything else is a retrieval failure.
#[derive(Default)]
pub struct FakeRetriever {
    pages: Mutex<HashMap<String, String>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeRetriever {
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.set_page(url, html);
        self
    }

    pub fn with_file(self, url: &str, bytes: &[u8]) -> Self {
        self.files.lock().unwrap().insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn set_page(&self, url: &str, html: &str) {
        self.pages.lock().unwrap().insert(url.to_string(), html.to_string());
    }
}

#[async_trait]
impl Retrieve for FakeRetriever {
    async fn get_page(&self, url: &Url) -> Result<String> {
        self.pages
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| WatchError::retrieval(url.as_str(), "HTTP status 404"))
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| WatchError::retrieval(url.as_str(), "HTTP status 404"))
    }
}

/// Reads any stored file as UTF-8 text, whatever its extension.
#[derive(Default)]
pub struct FakeExtractor;

#[async_trait]
impl ExtractText for FakeExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Upper-cases each chunk; chunks containing `fail_on` fail.
#[derive(Default)]
pub struct FakeTranslator {
    pub fail_on: Option<String>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeTranslator {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Translate for FakeTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), target_language.to_string()));
        match &self.fail_on {
            Some(marker) if text.contains(marker.as_str()) => {
                Err(WatchError::service("translation", "chunk rejected"))
            }
            _ => Ok(text.trim().to_uppercase()),
        }
    }
}

/// Replays scripted replies in order and records every prompt.
#[derive(Default)]
pub struct FakeCompleter {
    replies: Mutex<VecDeque<Result<String>>>,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl FakeCompleter {
    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_error(&self, reason: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(WatchError::service("completion", reason.to_string())));
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Complete for FakeCompleter {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(WatchError::service("completion", "no scripted reply")))
    }
}

/// Records delivered messages; fails every delivery when `fail` is set.
#[derive(Default)]
pub struct RecordingMailer {
    pub fail: bool,
    pub sent: Mutex<Vec<OutgoingMessage>>,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deliver for RecordingMailer {
    async fn deliver(&self, message: &OutgoingMessage) -> Result<()> {
        if self.fail {
            return Err(WatchError::Delivery("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
