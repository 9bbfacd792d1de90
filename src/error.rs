//! Error types for the pagemill library.

use std::io;
use thiserror::Error;

/// Result type alias for pagemill operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while linearizing a document.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The page source could not yield fragments or regions for a page.
    ///
    /// Fatal for that page only; the pipeline records it and continues.
    #[error("page source failed on page {page}: {reason}")]
    SourceRead {
        /// 1-indexed page number
        page: u32,
        /// Underlying failure description
        reason: String,
    },

    /// A collaborator exceeded its time bound.
    #[error("`{what}` timed out on page {page}")]
    FallbackTimeout {
        /// 1-indexed page number
        page: u32,
        /// Which collaborator timed out
        what: &'static str,
    },

    /// The optical-recognition engine failed outright.
    #[error("optical recognition failed: {0}")]
    Ocr(String),

    /// A ledger record was unreadable or malformed.
    #[error("ledger corruption: {0}")]
    LedgerCorruption(String),

    /// Another process holds the ledger lock.
    #[error("ledger is locked by another run (lock file: {0})")]
    LedgerLocked(String),

    /// Invalid run configuration. Fatal before any page is touched.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid page range specification.
    #[error("invalid page range: {0}")]
    InvalidPageRange(String),

    /// Page number is out of range.
    #[error("page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Error assembling or rendering output.
    #[error("rendering error: {0}")]
    Render(String),

    /// Error writing an extracted asset.
    #[error("asset write error: {0}")]
    AssetWrite(String),

    /// Input document could not be parsed (JSON page source).
    #[error("input parse error: {0}")]
    InputParse(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is scoped to a single page rather than the run.
    ///
    /// Page-scoped errors degrade the page and let the run continue; all
    /// others abort processing.
    pub fn is_page_scoped(&self) -> bool {
        matches!(
            self,
            Error::SourceRead { .. } | Error::FallbackTimeout { .. } | Error::Ocr(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InputParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FallbackTimeout {
            page: 7,
            what: "optical recognition",
        };
        assert_eq!(err.to_string(), "`optical recognition` timed out on page 7");

        let err = Error::PageOutOfRange(10, 5);
        assert_eq!(
            err.to_string(),
            "page 10 is out of range (document has 5 pages)"
        );
    }

    #[test]
    fn test_page_scoped() {
        assert!(Error::SourceRead {
            page: 1,
            reason: "gone".into()
        }
        .is_page_scoped());
        assert!(!Error::Config("bad mode".into()).is_page_scoped());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
