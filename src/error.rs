//! Error types shared by the storage engine and the operator layer.
//!
//! Every variant maps to exactly one HTTP status so that handlers can branch
//! on the failure class without inspecting messages.

use axum::http::StatusCode;
use thiserror::Error;

pub type KvsResult<T> = std::result::Result<T, KvsError>;
pub type FlameResult<T> = std::result::Result<T, FlameError>;

/// Failures of the storage engine and the storage client.
#[derive(Debug, Error)]
pub enum KvsError {
    /// Missing or malformed request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("table '{0}' not found")]
    TableNotFound(String),

    #[error("row '{row}' not found in table '{table}'")]
    RowNotFound { table: String, row: String },

    #[error("column '{column}' not found in row '{row}'")]
    ColumnNotFound { row: String, column: String },

    #[error("version {version} not found for row '{row}'")]
    VersionNotFound { row: String, version: u64 },

    /// Rename destination already exists.
    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("invalid table name '{0}'")]
    InvalidTableName(String),

    /// Conditional write mismatch as seen by a remote caller.
    #[error("precondition failed")]
    PreconditionFailed,

    #[error("row codec error: {0}")]
    Codec(String),

    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Network failure or unexpected status from a peer worker.
    #[error("transport error: {0}")]
    Transport(String),
}

impl KvsError {
    pub fn status(&self) -> StatusCode {
        match self {
            KvsError::BadRequest(_) | KvsError::InvalidTableName(_) => StatusCode::BAD_REQUEST,
            KvsError::TableNotFound(_)
            | KvsError::RowNotFound { .. }
            | KvsError::ColumnNotFound { .. }
            | KvsError::VersionNotFound { .. } => StatusCode::NOT_FOUND,
            KvsError::TableExists(_) => StatusCode::CONFLICT,
            KvsError::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            KvsError::Codec(_) | KvsError::Io { .. } | KvsError::Transport(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == StatusCode::NOT_FOUND
    }
}

impl From<reqwest::Error> for KvsError {
    fn from(e: reqwest::Error) -> Self {
        KvsError::Transport(e.to_string())
    }
}

/// Failures of an operator request.
#[derive(Debug, Error)]
pub enum FlameError {
    /// Rejected before any data access.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("code package error: {0}")]
    Package(String),

    /// Scan of the input or a write of the output failed.
    #[error("storage error: {0}")]
    Storage(#[from] KvsError),
}

impl FlameError {
    pub fn status(&self) -> StatusCode {
        match self {
            FlameError::BadRequest(_) => StatusCode::BAD_REQUEST,
            FlameError::Package(_) | FlameError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
