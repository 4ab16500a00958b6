//! Listing-page scraping.
//!
//! Regulators publish their documents as plain links on an index page, so a
//! single link extractor covers every source:
//!
//! 1. **Parsing**: every `a[href]` on the page is resolved against the page URL
//! 2. **Filtering**: only links whose path ends in a watched extension are kept
//! 3. **Titling**: link text, or the decoded file name when the text is empty

pub mod links;

pub use links::extract_document_links;
