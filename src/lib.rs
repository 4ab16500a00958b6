//! # RegWatch
//!
//! Watches regulator websites for new publications. Each pass downloads new
//! documents, translates them, summarizes and tags them against a keyword
//! vocabulary with a language model, and emails one notification per
//! document.
//!
//! ## Architecture
//!
//! One SQLite table of documents drives four batch stages in order:
//! 1. **Fetch**: scrape each source's listing page and register new files
//! 2. **Translate**: extract text and translate it chunk by chunk
//! 3. **Analyze**: summary plus keyword tags from an OpenAI-compatible model
//! 4. **Notify**: one email per analyzed document
//!
//! A document's [`models::DocumentStatus`] decides which stage picks it up
//! next, so an interrupted pass resumes where it stopped.

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod scheduler;
pub mod scrapers;
pub mod server;
pub mod services;
pub mod stages;
pub mod storage;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, WatchError};
pub use pipeline::{Pipeline, PipelineSettings, Services};
