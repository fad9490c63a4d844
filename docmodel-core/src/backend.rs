//! Storage backend abstraction for the record engine.
//!
//! This module defines the boundary between the generic engine and a concrete document
//! store. The engine never talks to a driver directly; it only issues the
//! collection-scoped operations of [`StoreBackend`] with an already rendered filter
//! document.
//!
//! # Traits
//!
//! - [`StoreBackend`]: collection-scoped find/insert/replace/delete/count/aggregate
//! - [`StoreSession`]: the transaction lifecycle of one backend session
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances
//!
//! # Sessions
//!
//! Every collection operation takes an optional session. `None` runs the operation
//! outside any transaction. `Some(session)` runs it inside the transaction the session
//! has started, so its effects are only visible through the same session until commit.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::backend::{StoreBackend, FindOptions};
//! use bson::doc;
//!
//! let id = backend.insert_one("users", doc! { "name": "Alice" }, None).await?;
//! let found = backend.find("users", doc! { "_id": id }, FindOptions::default(), None).await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::error::DocumentStoreResult;

/// Options applied to a `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return. `Some(0)` and `None` both mean no limit.
    pub limit: Option<i64>,
    /// Sort specification, e.g. `{ "created_at": -1 }`.
    pub sort: Option<Document>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Options applied to an `aggregate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    /// Lets the store spill large stages to disk.
    pub allow_disk_use: Option<bool>,
    /// Cursor batch size hint.
    pub batch_size: Option<u32>,
}

/// The transaction lifecycle of a backend session.
///
/// A session is exclusively owned by one engine instance; the engine never shares
/// it between concurrent callers.
#[async_trait]
pub trait StoreSession: Send + Sync + Debug {
    /// Begins a transaction on this session.
    async fn start_transaction(&mut self) -> DocumentStoreResult<()>;

    /// Makes every write performed through this session visible to other readers.
    async fn commit_transaction(&mut self) -> DocumentStoreResult<()>;

    /// Discards every write performed through this session.
    async fn abort_transaction(&mut self) -> DocumentStoreResult<()>;
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be safe to share across tasks: one backend handle is held by
/// every [`Model`](crate::model::Model) created for a connection.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// The backend's session type, used for transactions.
    type Session: StoreSession;

    /// Opens a new session on the underlying connection.
    async fn start_session(&self) -> DocumentStoreResult<Self::Session>;

    /// Returns every document in `collection` matching `filter`.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Returns the first document in `collection` matching `filter`, if any.
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Inserts `document` and returns its `_id`.
    ///
    /// The backend generates an identifier when `_id` is missing.
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Bson>;

    /// Replaces the first document matching `filter` and returns the match count.
    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64>;

    /// Deletes the first document matching `filter` and returns the deleted count.
    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64>;

    /// Counts the documents matching `filter`.
    async fn count(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64>;

    /// Runs an aggregation pipeline over `collection`.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        options: AggregateOptions,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Gracefully releases backend resources.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory trait for creating backend instances.
///
/// Connection establishment happens here, so this is where initialization failures
/// surface.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
