//! The four batch stages of a pipeline pass.
//!
//! Each stage drains the whole backlog of its input [`DocumentStatus`]
//! before returning, and advances every document it completes by exactly
//! one status.
//!
//! | Stage | Backlog | Writes |
//! |-------|---------|--------|
//! | [`Fetcher`] | listing page of one source | new `fetched` rows |
//! | [`Translator`] | `fetched` | `translated_text` |
//! | [`Analyzer`] | `translated` | `analysis_summary`, `matched_keywords` |
//! | [`Notifier`] | `analyzed` | `notified_at` |
//!
//! [`DocumentStatus`]: crate::models::DocumentStatus

pub mod analyzer;
pub mod fetcher;
pub mod notifier;
pub mod translator;

pub use analyzer::{Analyzer, Vocabulary};
pub use fetcher::Fetcher;
pub use notifier::Notifier;
pub use translator::Translator;
