//! Plain-text table of documents for `regwatch list`.

use crate::models::Document;

const TITLE_WIDTH: usize = 48;

pub fn render_documents(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "No documents registered yet.\n".to_string();
    }

    let mut out = format!(
        "{:>5}  {:<6}  {:<10}  {:<20}  {:<width$}  {}\n",
        "ID",
        "SOURCE",
        "STATUS",
        "CREATED",
        "TITLE",
        "KEYWORDS",
        width = TITLE_WIDTH,
    );
    for doc in docs {
        let keywords = doc
            .matched_keywords
            .as_deref()
            .map(|k| k.join(", "))
            .unwrap_or_default();
        out.push_str(&format!(
            "{:>5}  {:<6}  {:<10}  {:<20}  {:<width$}  {}\n",
            doc.id,
            doc.source,
            doc.status.as_str(),
            doc.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            fit(&doc.title, TITLE_WIDTH),
            keywords,
            width = TITLE_WIDTH,
        ));
    }
    out
}

fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
