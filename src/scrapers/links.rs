//! Document link extraction from regulator listing pages.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use crate::models::DocumentLink;
use crate::utils::collapse_whitespace;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Extract every link on `html` whose resolved path ends in one of
/// `extensions` (with or without the leading dot, case-insensitive).
///
/// Relative links are resolved against `page_url`. Repeated URLs keep their
/// first occurrence.
#[instrument(level = "info", skip(html, extensions), fields(page = %page_url))]
pub fn extract_document_links(
    html: &str,
    page_url: &Url,
    extensions: &[String],
) -> Vec<DocumentLink> {
    let suffixes: Vec<String> = extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{e}"))
        .collect();

    let document = Html::parse_document(html);
    let links: Vec<DocumentLink> = document
        .select(&ANCHOR)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = page_url.join(href.trim()).ok()?;
            if !has_watched_extension(&url, &suffixes) {
                return None;
            }
            let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            let title = if text.is_empty() {
                title_from_path(&url)
            } else {
                text
            };
            Some(DocumentLink { url, title })
        })
        .unique_by(|link| link.url.clone())
        .collect();

    info!(count = links.len(), "Extracted document links");
    debug!(urls = ?links.iter().map(|l| l.url.as_str()).collect::<Vec<_>>(), "Document URLs");
    links
}

fn has_watched_extension(url: &Url, suffixes: &[String]) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let path = url.path().to_ascii_lowercase();
    suffixes.iter().any(|s| path.ends_with(s.as_str()))
}

/// Percent-decoded last path segment.
fn title_from_path(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// File extension of a link's path without the dot, lowercased.
pub fn link_extension(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
