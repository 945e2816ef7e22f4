//! Error types for reading documents and catalogs and for merging them
//!
//! Node-level problems (a malformed key, a missing translation) never show up
//! here as hard failures: they are recorded in the merge report. The enums
//! below are for problems that abort a whole document or a whole catalog.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while reading class reference XML
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Input ended in the middle of a construct
    #[error("unexpected end of input at {line}:{column} while reading {context}")]
    UnexpectedEof {
        context: &'static str,
        line: usize,
        column: usize,
    },
    /// An end tag did not close the innermost open element
    #[error("mismatched end tag at {line}:{column}: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    /// Anything else that is not well-formed
    #[error("malformed markup at {line}:{column}: {message}")]
    Malformed {
        message: String,
        line: usize,
        column: usize,
    },
}

/// Failure while deriving a catalog key for one text node
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The derived key does not conform to the scheme's grammar
    #[error("malformed key '{key}': {reason}")]
    Malformed { key: String, reason: String },
}

/// Failure that aborts the merge of one document
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeError {
    /// The tree cannot be keyed, which points at an upstream parsing bug
    #[error("structural mismatch at {location}: {reason}")]
    StructuralMismatch { location: String, reason: String },
}

/// Failure while loading a translation catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Two entries claim the same key, so every lookup would be ambiguous
    #[error("duplicate catalog key '{key}' in {origin}")]
    DuplicateKey { key: String, origin: String },
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse JSON catalog '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{origin}:{line}: {message}")]
    Po {
        origin: String,
        line: usize,
        message: String,
    },
    #[error("invalid locale '{0}'")]
    InvalidLocale(String),
    #[error("no locale given for catalog '{0}' and none declared in it")]
    MissingLocale(String),
    #[error("unsupported catalog format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Failure of a single document inside a batch, or of the run around it
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("translation task for locale '{locale}' failed: {message}")]
    Task { locale: String, message: String },
    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
