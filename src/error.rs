use std::path::PathBuf;

use thiserror::Error;

/// Failure to obtain a show's catalog. Always scoped to a single show.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("catalog unreachable: {0}")]
    Network(String),

    #[error("catalog request timed out: {0}")]
    Timeout(String),

    #[error("show {0} not found in catalog")]
    NotFound(String),

    #[error("catalog returned HTTP status {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("malformed catalog response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to {action} {}: {source}", .path.display())]
    FileIo {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("show {0} appears more than once in the store")]
    DuplicateShow(u32),

    #[error("show {0} is not tracked")]
    NotFound(u32),

    #[error("show id {0} is not a positive integer")]
    InvalidShowId(u32),

    #[error("show {0} is already tracked")]
    AlreadyTracked(u32),

    #[error("invalid episode code {0:?} (expected SxxEyy or DONE)")]
    InvalidEpisodeCode(String),

    #[error("{0} is not supported")]
    NotSupported(&'static str),

    #[error("store file already exists at {}", .0.display())]
    AlreadyExists(PathBuf),
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::FileIo {
            action,
            path: path.into(),
            source,
        }
    }
}
