//! The generic record engine.
//!
//! [`Model`] performs CRUD, search, counting and aggregation over any [`Record`] type.
//! Every entry point first resolves the record's collection through its capability
//! contract, then builds a filter with [`Query`] and issues one store call through the
//! engine's execution context.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! let model = Model::new(InMemoryStore::new());
//!
//! let mut example = Example { title: "first".into(), ..Default::default() };
//! model.create(&mut example).await?;
//!
//! let id = example.id.unwrap().to_hex();
//! let found: Example = model.get_by_id(&id).await?;
//! let matching: Vec<Example> = model.get_many(Some("fir"), 0, 10).await?;
//! ```

use bson::{Bson, DateTime, Document, oid::ObjectId};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::{
    backend::{AggregateOptions, FindOptions, StoreBackend},
    collection::Collection,
    context::ExecutionContext,
    error::{DocumentStoreError, ModelError, ModelResult},
    query::{Query, query_id},
    record::{Record, ensure_supported, from_document, parse_id, to_document},
};

/// A record engine bound to one store handle and one execution context.
///
/// Plain engines are created once per connection with [`Model::new`] and can be shared
/// freely. Transactional engines come from
/// [`Model::start_transaction`](crate::model::Model::start_transaction) and live for one
/// unit of work.
#[derive(Debug)]
pub struct Model<B: StoreBackend> {
    pub(crate) backend: Arc<B>,
    pub(crate) context: ExecutionContext<B::Session>,
}

impl<B: StoreBackend> Model<B> {
    /// Creates a plain (non-transactional) engine over `backend`.
    pub fn new(backend: B) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    /// Creates a plain engine over an already shared backend handle.
    pub fn from_shared(backend: Arc<B>) -> Self {
        Self {
            backend,
            context: ExecutionContext::Plain,
        }
    }

    /// Returns the shared backend handle.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Returns `true` if this engine runs inside a transaction.
    pub fn is_transaction(&self) -> bool {
        self.context.is_transaction()
    }

    fn collection<R: Record>(&self) -> ModelResult<Collection<'_, B>> {
        Ok(Collection::new(ensure_supported::<R>()?, &self.backend, &self.context))
    }

    /// Returns up to `limit` records of type `R`, skipping `offset`.
    ///
    /// With `search` set, only records whose [`Record::search_fields`] contain the text
    /// (case-insensitively) are returned. A `limit` of `0` means no limit.
    pub async fn get_many<R: Record>(
        &self,
        search: Option<&str>,
        offset: u64,
        limit: i64,
    ) -> ModelResult<Vec<R>> {
        let mut query = Query::new();

        if let Some(text) = search {
            query.text_search(text, R::search_fields());
        }

        self.find_many(&query, FindOptions::new().skip(offset).limit(limit))
            .await
    }

    /// Returns the records whose identifiers are in `ids`.
    ///
    /// An empty list returns an empty result without touching the store; malformed
    /// identifiers are ignored.
    pub async fn get_many_by_ids<R: Record, S: AsRef<str>>(&self, ids: &[S]) -> ModelResult<Vec<R>> {
        ensure_supported::<R>()?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = Query::new();
        query.ids(ids);

        self.find_many(&query, FindOptions::default()).await
    }

    /// Returns the record with identifier `id`.
    ///
    /// # Errors
    ///
    /// [`ModelError::InvalidId`] if `id` is malformed, [`ModelError::NotFound`] if no
    /// record has it.
    pub async fn get_by_id<R: Record>(&self, id: &str) -> ModelResult<R> {
        ensure_supported::<R>()?;
        let id = parse_id(id)?;

        let mut query = Query::new();
        query.add("_id", id);

        self.find_one(&query).await
    }

    /// Inserts `record` and returns its stored identifier.
    ///
    /// Records exposing [`DefaultFields`](crate::record::DefaultFields) get a fresh
    /// identifier if theirs is unset, and have both timestamps stamped with the same
    /// instant. The stamped values are written back into `record`.
    pub async fn create<R: Record>(&self, record: &mut R) -> ModelResult<Bson> {
        let collection = self.collection::<R>()?;
        let mut document = to_document(record)?;

        if let Some(fields) = record.default_fields() {
            if fields.id().is_none() {
                fields.set_id(ObjectId::new());
            }

            let now = next_stamp(None);
            fields.set_created_at(now);
            fields.set_updated_at(now);

            document = to_document(record)?;
        }

        collection
            .insert_one(document)
            .await
            .map_err(|err| {
                tracing::error!(
                    collection = collection.name(),
                    error = %err,
                    "can't create object in database"
                );
                ModelError::Internal
            })
    }

    /// Replaces the stored document with identifier `id` by `record`.
    ///
    /// The update timestamp is stamped first and always moves forward, even when two
    /// updates land in the same millisecond.
    pub async fn update<R: Record>(&self, record: &mut R, id: &str) -> ModelResult<()> {
        let collection = self.collection::<R>()?;
        let object_id = parse_id(id)?;
        to_document(record)?;

        if let Some(fields) = record.default_fields() {
            let stamp = next_stamp(fields.updated_at());
            fields.set_updated_at(stamp);
        }

        let matched = collection
            .replace_one(query_id(object_id), to_document(record)?)
            .await
            .map_err(|err| {
                tracing::error!(
                    collection = collection.name(),
                    id,
                    error = %err,
                    "can't update object by id"
                );
                ModelError::Internal
            })?;

        if matched == 0 {
            tracing::warn!(collection = collection.name(), id, "update matched no document");
        }

        Ok(())
    }

    /// Deletes the record of type `R` with identifier `id`.
    pub async fn delete<R: Record>(&self, id: &str) -> ModelResult<()> {
        ensure_supported::<R>()?;
        let id = parse_id(id)?;

        let mut query = Query::new();
        query.add("_id", id);

        self.delete_where::<R>(&query).await?;

        Ok(())
    }

    /// Counts records of type `R`, optionally restricted to those matching `search`.
    pub async fn count<R: Record>(&self, search: Option<&str>) -> ModelResult<u64> {
        let mut query = Query::new();

        if let Some(text) = search {
            query.text_search(text, R::search_fields());
        }

        self.count_where::<R>(&query).await
    }

    /// Returns every record of type `R` matching `query`.
    pub async fn find_many<R: Record>(
        &self,
        query: &Query,
        options: FindOptions,
    ) -> ModelResult<Vec<R>> {
        let collection = self.collection::<R>()?;

        let documents = collection
            .find(query.exec(), options)
            .await
            .map_err(|err| {
                tracing::error!(collection = collection.name(), error = %err, "can't query objects");
                ModelError::Internal
            })?;

        decode_all(collection.name(), documents)
    }

    /// Returns the first record of type `R` matching `query`.
    ///
    /// Zero matches is [`ModelError::NotFound`]; every other failure is
    /// [`ModelError::Internal`].
    pub async fn find_one<R: Record>(&self, query: &Query) -> ModelResult<R> {
        let collection = self.collection::<R>()?;

        let document = collection
            .find_one(query.exec())
            .await
            .map_err(|err| {
                tracing::error!(
                    collection = collection.name(),
                    error = %err,
                    "can't get object from database"
                );
                ModelError::Internal
            })?
            .ok_or(ModelError::NotFound)?;

        from_document(document).map_err(|err| {
            tracing::error!(collection = collection.name(), error = %err, "can't decode object");
            ModelError::Internal
        })
    }

    /// Deletes the first record of type `R` matching `query`, returning how many were
    /// deleted.
    pub async fn delete_where<R: Record>(&self, query: &Query) -> ModelResult<u64> {
        let collection = self.collection::<R>()?;

        collection
            .delete_one(query.exec())
            .await
            .map_err(|err| {
                tracing::error!(
                    collection = collection.name(),
                    error = %err,
                    "can't delete object from database"
                );
                ModelError::Internal
            })
    }

    /// Counts records of type `R` matching `query`.
    pub async fn count_where<R: Record>(&self, query: &Query) -> ModelResult<u64> {
        let collection = self.collection::<R>()?;

        collection
            .count(query.exec())
            .await
            .map_err(|err| {
                tracing::error!(
                    collection = collection.name(),
                    error = %err,
                    "can't count objects in database"
                );
                ModelError::Internal
            })
    }

    /// Runs `pipeline` over the collection of `R` and decodes each output document
    /// as `T`.
    ///
    /// `T` is free to differ from `R`: pipelines commonly reshape documents.
    pub async fn aggregate<R: Record, T: DeserializeOwned>(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> ModelResult<Vec<T>> {
        let collection = self.collection::<R>()?;

        collection
            .aggregate(pipeline, options)
            .await
            .map_err(|err| {
                tracing::error!(collection = collection.name(), error = %err, "can't aggregate objects");
                ModelError::Internal
            })?
            .into_iter()
            .map(|document| {
                bson::de::deserialize_from_bson(Bson::Document(document)).map_err(|err| {
                    tracing::error!(
                        collection = collection.name(),
                        error = %err,
                        "can't decode aggregated objects"
                    );
                    ModelError::Internal
                })
            })
            .collect()
    }
}

fn decode_all<R: Record>(collection: &str, documents: Vec<Document>) -> ModelResult<Vec<R>> {
    documents
        .into_iter()
        .map(from_document)
        .collect::<Result<Vec<R>, DocumentStoreError>>()
        .map_err(|err| {
            tracing::error!(collection, error = %err, "can't decode queried objects");
            ModelError::Internal
        })
}

/// The timestamp to stamp on a write, never earlier than one millisecond past
/// `previous`.
pub(crate) fn next_stamp(previous: Option<DateTime>) -> DateTime {
    let now = DateTime::from_chrono(Utc::now());

    match previous {
        Some(previous) if previous >= now => {
            DateTime::from_millis(previous.timestamp_millis() + 1)
        }
        _ => now,
    }
}
