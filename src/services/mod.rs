//! External capabilities the pipeline stages depend on.
//!
//! Every capability is a trait so stages receive explicitly constructed
//! clients and tests can substitute fakes.
//!
//! | Capability | Trait | Production implementation |
//! |------------|-------|---------------------------|
//! | Page and file download | [`Retrieve`] | [`http::HttpRetriever`] (reqwest) |
//! | Text extraction | [`ExtractText`] | [`extract::FileTextExtractor`] (pdf-extract) |
//! | Translation | [`Translate`] | [`translate::ChatTranslator`], [`translate::LibreTranslateClient`] |
//! | Language-model completion | [`Complete`] | [`llm::ChatClient`] wrapped in [`llm::RetryComplete`] |
//! | Notification delivery | [`Deliver`] | [`mail::SmtpMailer`] (lettre) |

pub mod extract;
pub mod http;
pub mod llm;
pub mod mail;
pub mod translate;

pub use extract::ExtractText;
pub use http::Retrieve;
pub use llm::{Complete, Prompt};
pub use mail::{Deliver, OutgoingMessage};
pub use translate::Translate;
