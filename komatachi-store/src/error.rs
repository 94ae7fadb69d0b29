//! Storage errors

use std::io;
use std::path::PathBuf;

/// Errors from the storage layer and the conversation store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The file was expected and is missing. Callers may recover (first run).
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    /// Data that should parse does not. Never fabricated around.
    #[error("corrupt data in {path}: {detail}")]
    Corrupt { path: PathBuf, detail: String },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `initialize` on a conversation directory that already has metadata.
    #[error("conversation already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Store accessed before `load` or `initialize`. A programming error.
    #[error("conversation not loaded")]
    NotLoaded,
}

impl StoreError {
    /// Stable kind string for protocol error frames.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::Corrupt { .. } => "Corrupt",
            Self::Io { .. } => "IO",
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::NotLoaded => "NotLoaded",
        }
    }

    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}
