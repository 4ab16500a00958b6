//! Emails one notification per analyzed document.

use chrono::Utc;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::{Document, DocumentStatus};
use crate::services::{Deliver, OutgoingMessage};
use crate::store::DocumentStore;

pub struct Notifier<'a> {
    store: &'a DocumentStore,
    mailer: &'a dyn Deliver,
    recipient: &'a str,
    product_name: &'a str,
}

impl<'a> Notifier<'a> {
    pub fn new(
        store: &'a DocumentStore,
        mailer: &'a dyn Deliver,
        recipient: &'a str,
        product_name: &'a str,
    ) -> Self {
        Self {
            store,
            mailer,
            recipient,
            product_name,
        }
    }

    /// Notify every `analyzed` document and return how many were sent.
    ///
    /// The first delivery failure is returned immediately; the failed
    /// document and the rest of the backlog stay `analyzed`.
    #[instrument(level = "info", skip(self))]
    pub async fn run(&self) -> Result<usize> {
        let docs = self.store.backlog(DocumentStatus::Analyzed).await?;
        info!(count = docs.len(), "Documents to notify");

        let mut sent = 0usize;
        for doc in docs {
            let message = render_message(&doc, self.product_name, self.recipient);
            self.mailer.deliver(&message).await?;
            self.store.mark_notified(doc.id, Utc::now()).await?;
            sent += 1;
            info!(id = doc.id, "Notification sent");
        }
        Ok(sent)
    }
}

/// Render the notification for `doc`.
pub fn render_message(doc: &Document, product_name: &str, recipient: &str) -> OutgoingMessage {
    let keywords = match doc.matched_keywords.as_deref() {
        Some(keywords) if !keywords.is_empty() => keywords.join(", "),
        _ => "None".to_string(),
    };
    let summary = doc.analysis_summary.as_deref().unwrap_or_default();

    let body = format!(
        "Hello,\n\n\
         A new or updated regulatory document has been detected.\n\n\
         Source: {source}\n\
         Title: {title}\n\
         URL: {url}\n\n\
         Matched keywords: {keywords}\n\n\
         Summary:\n{summary}\n\n\
         Best regards,\n\
         {product_name} Watcher\n",
        source = doc.source,
        title = doc.title,
        url = doc.origin_url,
    );

    OutgoingMessage {
        to: recipient.to_string(),
        subject: format!("[{product_name}] New regulatory update from {}", doc.source),
        body,
    }
}
