//! Error taxonomy of the transfer endpoints
//!
//! Every failure maps to an HTTP status and a JSON body
//! `{"kind": ..., "message": ..., "retryable": ...}`.
//!
//! | kind                                   | status |
//! |----------------------------------------|--------|
//! | `InvalidRequest`                       | 400    |
//! | `Forbidden`                            | 403    |
//! | `EmptyExportFailure`                   | 404    |
//! | `ConflictFailure`                      | 409    |
//! | version, integrity, entity, constraint | 422    |
//! | `ReadFailure`, `WriteFailure`, stream  | 500    |
//! | `TimeoutFailure`                       | 503    |

use std::io;

use ferry_core::{ErrorKind, FerryError};
use serde::Serialize;
use thiserror::Error;

/// Error returned by a transfer endpoint
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller lacks the required role
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Export or restore failed
    #[error(transparent)]
    Ferry(#[from] FerryError),

    /// Writing the archive into the response failed
    #[error("response stream failed: {0}")]
    Stream(#[source] io::Error),
}

/// Result type for endpoint operations
pub type ApiResult<T> = Result<T, ApiError>;

/// JSON error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable error kind
    pub kind: String,
    /// Human-readable description
    pub message: String,
    /// Whether the same request may succeed later
    pub retryable: bool,
}

impl ApiError {
    /// Forbidden with a reason
    pub fn forbidden(reason: impl Into<String>) -> Self {
        ApiError::Forbidden(reason.into())
    }

    /// Stable kind reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::Ferry(e) => e.kind().as_str(),
            ApiError::Stream(_) => "WriteFailure",
        }
    }

    /// HTTP status code
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Forbidden(_) => 403,
            ApiError::Stream(_) => 500,
            ApiError::Ferry(e) => match e.kind() {
                ErrorKind::InvalidRequest => 400,
                ErrorKind::EmptyExportFailure => 404,
                ErrorKind::ConflictFailure => 409,
                ErrorKind::VersionFailure
                | ErrorKind::IntegrityFailure
                | ErrorKind::UnknownEntityFailure
                | ErrorKind::MissingEntityFailure
                | ErrorKind::ConstraintFailure => 422,
                ErrorKind::TimeoutFailure => 503,
                ErrorKind::ReadFailure | ErrorKind::WriteFailure => 500,
            },
        }
    }

    /// Whether the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Ferry(e) => e.is_retryable(),
            ApiError::Forbidden(_) | ApiError::Stream(_) => false,
        }
    }

    /// Body sent with the status
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind().to_string(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }

    /// Body serialized as JSON
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(&self.body()).unwrap_or_default()
    }
}
