use thiserror::Error;

use crate::guard::ClipboardOp;

/// Failures from the SQLite-backed store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to create directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("store lock poisoned")]
    Poisoned,
}

/// Failures reported by a submission collaborator
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("clipboard {0} is blocked during the exam")]
    Blocked(ClipboardOp),
    #[error("clipboard unavailable")]
    Unavailable,
}

/// Failures while loading an exam descriptor or question bank
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid exam descriptor: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: {message}")]
    Mcq { line: usize, message: String },
}

impl LoadError {
    pub(crate) fn mcq(line: usize, message: impl Into<String>) -> Self {
        LoadError::Mcq {
            line,
            message: message.into(),
        }
    }
}
