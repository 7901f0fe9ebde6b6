//! Store-wide error type and classification.
//!
//! # Responsibility
//! - Provide one error type for every repository operation.
//! - Classify failures into stable kinds callers can branch on.
//! - Carry operation name and entity id annotations without hiding the kind.
//!
//! # Invariants
//! - `StoreError::kind()` sees through any number of annotations.
//! - Constraint violations reported by SQLite classify as `Conflict`.
//! - `QueryReturnedNoRows` classifies as `NotFound`.

use crate::db::DbError;
use rusqlite::ErrorCode;
use std::fmt::Display;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse failure classes exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty id, missing field, bad window, or unknown enum spelling.
    InvalidInput,
    /// No row matched.
    NotFound,
    /// Unique constraint or state-machine violation.
    Conflict,
    /// Begin, commit or rollback failed.
    TransactionFailure,
    /// Driver or connectivity failure.
    Transport,
    /// Caller cancelled the context or its deadline passed.
    Cancelled,
    /// Persisted data could not be decoded.
    InvalidData,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no {0} matched the query")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("failed to {stage} transaction")]
    Transaction {
        stage: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("operation cancelled before {0}")]
    Cancelled(&'static str),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("secret cipher failure: {0}")]
    Cipher(String),
    #[error("{operation} [{id}]: {source}")]
    Annotated {
        operation: &'static str,
        id: String,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Returns the failure class, looking through annotations.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Transaction { .. } => ErrorKind::TransactionFailure,
            Self::Db(DbError::UnsupportedSchemaVersion { .. }) => ErrorKind::InvalidData,
            Self::Db(_) => ErrorKind::Transport,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::InvalidData(_) | Self::Cipher(_) => ErrorKind::InvalidData,
            Self::Annotated { source, .. } => source.kind(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub(crate) fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound("row"),
            rusqlite::Error::SqliteFailure(ref failure, ref message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(
                    message
                        .clone()
                        .unwrap_or_else(|| "constraint violation".to_string()),
                )
            }
            other => Self::Db(DbError::Sqlite(other)),
        }
    }
}

/// Adds operation/entity context to repository results.
pub trait ResultExt<T> {
    fn annotate(self, operation: &'static str, id: impl Display) -> StoreResult<T>;
}

impl<T> ResultExt<T> for StoreResult<T> {
    fn annotate(self, operation: &'static str, id: impl Display) -> StoreResult<T> {
        self.map_err(|source| StoreError::Annotated {
            operation,
            id: id.to_string(),
            source: Box::new(source),
        })
    }
}

/// Rejects blank identifiers before any SQL runs.
pub(crate) fn require_id(value: &str, field: &'static str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}
