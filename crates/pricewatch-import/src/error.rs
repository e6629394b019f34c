//! Ingestion errors.

use std::io;

use pricewatch_core::event::StreamKind;

/// Failure at the ingestion boundary. Ingestion is fail-fast: the first
/// malformed row aborts the whole file.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("{label}: {source}")]
    Io {
        label: String,
        #[source]
        source: io::Error,
    },

    #[error("{label}:{line}: column `{column}`: {message}")]
    Parse {
        label: String,
        line: usize,
        column: &'static str,
        message: String,
    },

    #[error("{label}:{line}: expected {expected} columns, found {found}")]
    ColumnCount {
        label: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{label}:{line}: unterminated quoted field")]
    UnterminatedQuote { label: String, line: usize },

    #[error("cache version mismatch: expected {expected}, found {found}")]
    CacheVersion { expected: String, found: String },

    #[error("cache holds {found} events, expected {expected}")]
    CacheKind { expected: StreamKind, found: StreamKind },

    #[error("cache codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl ImportError {
    pub(crate) fn io(label: impl Into<String>, source: io::Error) -> Self {
        ImportError::Io {
            label: label.into(),
            source,
        }
    }
}
