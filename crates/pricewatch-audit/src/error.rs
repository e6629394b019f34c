//! Audit pipeline errors.

use std::io;
use std::path::PathBuf;

use pricewatch_import::ImportError;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no {0} input given")]
    MissingInput(&'static str),

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl AuditError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        AuditError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialize(what: &'static str, source: serde_json::Error) -> Self {
        AuditError::Serialize { what, source }
    }

    /// Whether the failure is a missing input file.
    pub fn is_not_found(&self) -> bool {
        match self {
            AuditError::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            AuditError::Import(ImportError::Io { source, .. }) => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}
