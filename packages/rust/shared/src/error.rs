//! Error types for AtlasBot.
//!
//! Library crates use [`AtlasError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all AtlasBot operations.
#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching page markup or an image.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or table-structure error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A page lacks an expected structural element (e.g. a top-level heading).
    /// Enrichment for the affected entity aborts; already-set fields are kept.
    #[error("malformed page: {message}")]
    MalformedPage { message: String },

    /// The page has no infobox table, so no primary image can be located.
    #[error("no infobox table was found")]
    NoInfobox,

    /// The infobox exists but contains no image.
    #[error("no image found in infobox")]
    NoImage,

    /// No registry entry matches the query.
    #[error("no location found for {query:?}")]
    NotFound { query: String },

    /// An operation required enrichment fields that have not been fetched.
    #[error("enrichment fields not fetched for {link}")]
    MissingEnrichment { link: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AtlasError>;

impl AtlasError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a malformed-page error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPage {
            message: msg.into(),
        }
    }

    /// Create a not-found error for a query string.
    pub fn not_found(query: impl Into<String>) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
