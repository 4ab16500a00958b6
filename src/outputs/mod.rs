//! Operator-facing output: run reports and document listings.
//!
//! # Submodules
//!
//! - [`json`]: writes one JSON report per pipeline run
//! - [`listing`]: renders recent documents as a plain-text table
//!
//! # Output Structure
//!
//! ```text
//! report_dir/
//! └── 2025-05-06/
//!     ├── 100000.json
//!     └── 163012.json
//! ```

pub mod json;
pub mod listing;
