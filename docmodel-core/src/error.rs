//! Error types and result types for store and engine operations.
//!
//! Two layers of errors exist:
//!
//! - [`DocumentStoreError`] is what a [`StoreBackend`](crate::backend::StoreBackend) returns.
//!   It carries as much detail as the backend can give.
//! - [`ModelError`] is what the [`Model`](crate::model::Model) returns to callers. It is a
//!   small closed set of kinds; store failures are collapsed into [`ModelError::Internal`]
//!   after the original cause has been logged.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all errors a storage backend can report.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between records and BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given identifier already exists in the collection.
    /// The first argument is the identifier, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The document has an invalid structure (e.g. is not a BSON document).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The filter expression uses an operator or shape the backend cannot evaluate.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    /// The aggregation pipeline contains a stage the backend does not support.
    #[error("Unsupported pipeline stage: {0}")]
    UnsupportedStage(String),
    /// A session or transaction was used in a state that does not allow the operation.
    #[error("Transaction error: {0}")]
    Transaction(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for backend operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

/// The error kinds the record engine exposes to callers.
///
/// The set is closed so callers can match exhaustively. Store-level detail is never
/// carried here; it is emitted as a `tracing` event where the failure is collapsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The record type does not satisfy the capability contract. Carries the type name.
    #[error("type '{0}' is not supported, implement Record with a valid collection name to use it")]
    UnsupportedType(String),
    /// A caller-supplied identifier is not a valid store identifier.
    #[error("invalid identifier '{0}'")]
    InvalidId(String),
    /// A single-record lookup matched nothing.
    #[error("record not found")]
    NotFound,
    /// Any store, decode or transaction failure.
    #[error("internal error")]
    Internal,
}

/// A specialized `Result` type for record engine operations.
pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound)
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ModelError::Internal)
    }
}
