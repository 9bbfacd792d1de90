//! # pagemill
//!
//! Streaming page-by-page linearization of paginated documents into
//! structured Markdown.
//!
//! pagemill turns a page's raw positioned text fragments into a classified
//! sequence of structural elements (headings, paragraphs, verbatim code
//! blocks, callouts, table and image references), falls back to optical
//! recognition for low-yield scanned pages, and persists a per-page resume
//! ledger so an interrupted run picks up exactly where it stopped without
//! duplicating output.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pagemill::{JsonSource, Pipeline, RunConfig};
//!
//! fn main() -> pagemill::Result<()> {
//!     let source = JsonSource::open("document.json")?;
//!     let config = RunConfig::new().with_toc(true);
//!
//!     let report = Pipeline::new(source, config).run("out".as_ref())?;
//!     println!("processed {} pages", report.processed.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Structure preservation**: headings by font-size tiers, verbatim code
//!   blocks, callouts, tables, images
//! - **Bounded memory**: fragments and statistics live only while their
//!   page is processed
//! - **Resumable runs**: a durable single-writer ledger gates reprocessing
//! - **Optical-recognition fallback**: low-yield pages degrade gracefully
//!   instead of producing gaps

pub mod assemble;
pub mod assets;
pub mod classify;
pub mod config;
pub mod error;
pub mod fallback;
pub mod ledger;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod signal;
pub mod source;
pub mod validate;

// Re-export commonly used types
pub use assemble::{Assembler, DOCUMENT_FILE};
pub use assets::{AssetWriter, DirAssetWriter};
pub use config::{ClassifyThresholds, FallbackThresholds, Mode, PageSelection, RunConfig};
pub use error::{Error, Result};
pub use fallback::FallbackAction;
pub use ledger::{LedgerEntry, PageStatus, ResumeLedger, LEDGER_FILE};
pub use model::{CalloutKind, DocMetadata, Element, Fragment, PageGeometry, Region};
pub use pipeline::{PageWarning, Pipeline, RunReport};
pub use source::{
    CommandOcr, JsonSource, MemoryPage, MemorySource, NullOcr, OcrEngine, PageImage, PageSource,
    PageTable,
};
pub use validate::{validate_output, ValidationReport};

use std::path::Path;

/// Convert a fragment-dump JSON document into `out_dir`.
///
/// # Example
///
/// ```no_run
/// use pagemill::{convert_json_file, RunConfig};
///
/// let report = convert_json_file("document.json", "out", RunConfig::default()).unwrap();
/// assert!(report.is_clean());
/// ```
pub fn convert_json_file(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: RunConfig,
) -> Result<RunReport> {
    let source = JsonSource::open(input)?;
    Pipeline::new(source, config).run(out_dir.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_reexports() {
        let config = RunConfig::new().with_mode(Mode::Accurate).with_force(true);
        assert_eq!(config.mode, Mode::Accurate);
        assert!(config.force);
    }

    #[test]
    fn test_convert_missing_input() {
        let result = convert_json_file("does-not-exist.json", "out", RunConfig::default());
        assert!(result.is_err());
    }
}
