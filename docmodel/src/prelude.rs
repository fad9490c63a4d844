//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to the engine, the record traits and derive, the filter
//! builder, the backend traits and the error types.

pub use docmodel_core::{
    backend::{AggregateOptions, FindOptions, StoreBackend, StoreBackendBuilder, StoreSession},
    error::{DocumentStoreError, DocumentStoreResult, ModelError, ModelResult},
    model::Model,
    query::{Query, query_id},
    record::{DefaultFields, Record},
};
pub use docmodel_macros::Record;
