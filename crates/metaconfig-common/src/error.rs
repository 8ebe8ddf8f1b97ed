//! Error types and error codes for Metaconfig
//!
//! This module defines:
//! - `MetaConfigError`: Error enum shared by every repository backend
//! - `ErrorCode`: Structured error codes for API responses

use serde::{Deserialize, Serialize};

/// Result alias used throughout the workspace
pub type Result<T> = std::result::Result<T, MetaConfigError>;

/// Failures surfaced by entities, repositories and the REST client
#[derive(thiserror::Error, Debug)]
pub enum MetaConfigError {
    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("statement error: {0}")]
    Statement(String),

    #[error("attributes error: {0}")]
    Attributes(String),

    #[error("rollback error: {rollback} (original error: {original})")]
    Rollback { original: String, rollback: String },

    #[error("remote error: {0}")]
    Remote(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{operation}: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<MetaConfigError>,
    },
}

impl MetaConfigError {
    /// Wraps an error with the stable message of the public operation that failed.
    ///
    /// Errors that are already wrapped are returned as is.
    pub fn operation(operation: &'static str, source: MetaConfigError) -> Self {
        match source {
            wrapped @ MetaConfigError::Operation { .. } => wrapped,
            other => MetaConfigError::Operation {
                operation,
                source: Box::new(other),
            },
        }
    }

    /// Builds an `Attributes` error from every collected per-row failure.
    pub fn attributes<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = messages
            .into_iter()
            .map(|m| m.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        MetaConfigError::Attributes(joined)
    }

    /// The innermost error, skipping operation wrappers.
    pub fn root(&self) -> &MetaConfigError {
        match self {
            MetaConfigError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_illegal_argument(&self) -> bool {
        matches!(self.root(), MetaConfigError::IllegalArgument(_))
    }
}

#[cfg(feature = "db")]
impl From<sea_orm::DbErr> for MetaConfigError {
    fn from(value: sea_orm::DbErr) -> Self {
        match value {
            sea_orm::DbErr::Conn(_) | sea_orm::DbErr::ConnectionAcquire(_) => {
                MetaConfigError::Connection(value.to_string())
            }
            other => MetaConfigError::Statement(other.to_string()),
        }
    }
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};
