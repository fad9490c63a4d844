//! In-memory storage implementation for the record engine.
//!
//! Documents are kept as BSON documents per collection, keyed by their `_id`, behind
//! an async-aware read-write lock. Sessions stage transactional writes in an overlay
//! that only the owning session reads through, and apply it in one step on commit.

use std::{collections::{BTreeMap, HashMap}, sync::Arc, cmp::Ordering};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, doc, oid::ObjectId};

use docmodel_core::{
    backend::{AggregateOptions, FindOptions, StoreBackend, StoreBackendBuilder, StoreSession},
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::evaluator::{DocumentEvaluator, lookup, sort_order};

/// Documents of one collection keyed by the display form of their `_id`.
///
/// Generated `ObjectId`s grow monotonically within a process, so key order doubles as
/// insertion order for them.
type CollectionMap = BTreeMap<String, Document>;
type StoreMap = HashMap<String, CollectionMap>;
/// Staged writes of one transaction: `None` marks a deletion.
type StagedMap = HashMap<String, BTreeMap<String, Option<Document>>>;


/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Transactions
///
/// Writes made through a session with an active transaction are invisible to every
/// other reader until [`StoreSession::commit_transaction`]. Reads through that session
/// see committed data with the session's own writes layered on top. Write conflicts
/// between concurrent transactions are not detected; the last commit wins.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::{StoreBackend, FindOptions};
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = store.insert_one("users", doc! { "name": "Alice" }, None).await?;
///     let docs = store.find("users", doc! { "_id": id }, FindOptions::default(), None).await?;
///     assert_eq!(docs.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> (document_id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Runs `scan` over the documents of `collection` as `session` sees them.
    ///
    /// Committed documents are scanned in place under the read lock. A copy with the
    /// session's staged writes layered on top is only built when the session has
    /// staged writes for this collection.
    async fn scan<T>(
        &self,
        collection: &str,
        session: Option<&InMemorySession>,
        scan: impl FnOnce(&CollectionMap) -> DocumentStoreResult<T>,
    ) -> DocumentStoreResult<T> {
        let store = self.store.read().await;
        let committed = store.get(collection);

        let staged = session
            .filter(|session| session.in_transaction)
            .and_then(|session| session.staged.get(collection))
            .filter(|staged| !staged.is_empty());

        match (committed, staged) {
            (Some(committed), None) => scan(committed),
            (None, None) => scan(&CollectionMap::new()),
            (committed, Some(staged)) => {
                let mut view = committed.cloned().unwrap_or_default();

                for (key, document) in staged {
                    match document {
                        Some(document) => view.insert(key.clone(), document.clone()),
                        None => view.remove(key),
                    };
                }

                scan(&view)
            },
        }
    }

    /// Writes (or with `None`, deletes) one document, staging it if `session` has a
    /// transaction open.
    async fn write(
        &self,
        collection: &str,
        key: String,
        document: Option<Document>,
        session: Option<&mut InMemorySession>,
    ) {
        match session {
            Some(session) if session.in_transaction => {
                session.staged
                    .entry(collection.to_string())
                    .or_default()
                    .insert(key, document);
            },
            _ => {
                let mut store = self.store.write().await;
                let collection_map = store
                    .entry(collection.to_string())
                    .or_default();

                match document {
                    Some(document) => collection_map.insert(key, document),
                    None => collection_map.remove(&key),
                };
            },
        }
    }

    /// Returns the key and document of the first entry in `view` matching `filter`.
    fn first_match<'v>(
        view: &'v CollectionMap,
        filter: &Document,
    ) -> DocumentStoreResult<Option<(&'v String, &'v Document)>> {
        for (key, document) in view {
            if DocumentEvaluator::new(document).matches(filter)? {
                return Ok(Some((key, document)));
            }
        }

        Ok(None)
    }

    /// Clones the documents in `view` matching `filter`.
    fn matching(view: &CollectionMap, filter: &Document) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in view.values() {
            if DocumentEvaluator::new(document).matches(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }
}

fn id_key(id: &Bson) -> String {
    id.to_string()
}

/// Moves `_id` to the front of the document, generating one if missing.
fn with_id(document: Document) -> (Bson, Document) {
    let id = document
        .get("_id")
        .cloned()
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut prepared = doc! { "_id": id.clone() };
    for (key, value) in document {
        if key != "_id" {
            prepared.insert(key, value);
        }
    }

    (id, prepared)
}

fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|a, b| {
        for (field, direction) in sort {
            let ordering = sort_order(lookup(a, field), lookup(b, field));
            let ordering = match direction.as_i64().or_else(|| direction.as_i32().map(i64::from)) {
                Some(direction) if direction < 0 => ordering.reverse(),
                _ => ordering,
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    });
}

fn stage_argument(stage: &str, value: &Bson) -> DocumentStoreResult<usize> {
    match value {
        Bson::Int32(n) if *n >= 0 => Ok(*n as usize),
        Bson::Int64(n) if *n >= 0 => Ok(*n as usize),
        _ => Err(DocumentStoreError::InvalidFilter(
            format!("{stage} expects a non-negative integer"),
        )),
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    type Session = InMemorySession;

    async fn start_session(&self) -> DocumentStoreResult<Self::Session> {
        Ok(InMemorySession {
            store: Arc::clone(&self.store),
            in_transaction: false,
            staged: StagedMap::new(),
        })
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut documents = self
            .scan(collection, session.as_deref(), |view| Self::matching(view, &filter))
            .await?;

        if let Some(sort) = &options.sort {
            sort_documents(&mut documents, sort);
        }

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = match options.limit {
            Some(limit) if limit > 0 => limit as usize,
            // A negative limit asks for a single batch of that size.
            Some(limit) if limit < 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        Ok(
            documents
                .into_iter()
                .skip(skip)
                .take(limit)
                .collect()
        )
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Option<Document>> {
        self.scan(collection, session.as_deref(), |view| {
            Ok(Self::first_match(view, &filter)?.map(|(_, document)| document.clone()))
        })
        .await
    }

    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Bson> {
        let (id, document) = with_id(document);
        let key = id_key(&id);

        match session {
            Some(session) if session.in_transaction => {
                let exists = self
                    .scan(collection, Some(&*session), |view| Ok(view.contains_key(&key)))
                    .await?;

                if exists {
                    return Err(DocumentStoreError::DocumentAlreadyExists(key, collection.to_string()));
                }

                self.write(collection, key, Some(document), Some(session)).await;
            },
            _ => {
                let mut store = self.store.write().await;
                let collection_map = store
                    .entry(collection.to_string())
                    .or_default();

                if collection_map.contains_key(&key) {
                    return Err(DocumentStoreError::DocumentAlreadyExists(key, collection.to_string()));
                }

                collection_map.insert(key, document);
            },
        }

        Ok(id)
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
        mut session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64> {
        let matched = self
            .scan(collection, session.as_deref(), |view| {
                Ok(Self::first_match(view, &filter)?.map(|(key, document)| {
                    (key.clone(), document.get("_id").cloned().unwrap_or(Bson::Null))
                }))
            })
            .await?;

        let Some((key, existing_id)) = matched else {
            return Ok(0);
        };

        if let Some(new_id) = document.get("_id") {
            if *new_id != existing_id {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "replacement would change _id from {existing_id} to {new_id}"
                )));
            }
        }

        let mut replacement = doc! { "_id": existing_id };
        for (field, value) in document {
            replacement.insert(field, value);
        }

        self.write(collection, key, Some(replacement), session.as_deref_mut()).await;

        Ok(1)
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        mut session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64> {
        let matched = self
            .scan(collection, session.as_deref(), |view| {
                Ok(Self::first_match(view, &filter)?.map(|(key, _)| key.clone()))
            })
            .await?;

        let Some(key) = matched else {
            return Ok(0);
        };

        self.write(collection, key, None, session.as_deref_mut()).await;

        Ok(1)
    }

    async fn count(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64> {
        self.scan(collection, session.as_deref(), |view| {
            let mut count = 0;

            for document in view.values() {
                if DocumentEvaluator::new(document).matches(&filter)? {
                    count += 1;
                }
            }

            Ok(count)
        })
        .await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        _options: AggregateOptions,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut documents = self
            .scan(collection, session.as_deref(), |view| Ok(view.values().cloned().collect::<Vec<_>>()))
            .await?;

        for stage in pipeline {
            let mut entries = stage.into_iter();
            let (Some((name, argument)), None) = (entries.next(), entries.next()) else {
                return Err(DocumentStoreError::InvalidFilter(
                    "a pipeline stage must have exactly one field".to_string(),
                ));
            };

            documents = match (name.as_str(), argument) {
                ("$match", Bson::Document(filter)) => {
                    DocumentEvaluator::filter_documents(documents, &filter)?
                },
                ("$sort", Bson::Document(sort)) => {
                    sort_documents(&mut documents, &sort);
                    documents
                },
                ("$skip", value) => {
                    let skip = stage_argument("$skip", &value)?;
                    documents.into_iter().skip(skip).collect()
                },
                ("$limit", value) => {
                    let limit = stage_argument("$limit", &value)?;
                    documents.into_iter().take(limit).collect()
                },
                ("$count", Bson::String(field)) => match documents.len() {
                    0 => Vec::new(),
                    count => {
                        let count = count as i64;
                        vec![doc! { field: count }]
                    },
                },
                (other, _) => return Err(DocumentStoreError::UnsupportedStage(other.to_string())),
            };
        }

        Ok(documents)
    }
}


/// A session over an [`InMemoryStore`].
///
/// Outside a transaction, operations through the session act directly on the store.
#[derive(Debug)]
pub struct InMemorySession {
    store: Arc<RwLock<StoreMap>>,
    in_transaction: bool,
    staged: StagedMap,
}

impl InMemorySession {
    /// Returns `true` while a transaction is open on this session.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[async_trait]
impl StoreSession for InMemorySession {
    async fn start_transaction(&mut self) -> DocumentStoreResult<()> {
        if self.in_transaction {
            return Err(DocumentStoreError::Transaction("transaction already in progress".to_string()));
        }

        self.in_transaction = true;
        self.staged.clear();

        Ok(())
    }

    async fn commit_transaction(&mut self) -> DocumentStoreResult<()> {
        if !self.in_transaction {
            return Err(DocumentStoreError::Transaction("no transaction started".to_string()));
        }

        let mut store = self.store.write().await;

        for (collection, writes) in self.staged.drain() {
            let collection_map = store.entry(collection).or_default();

            for (key, document) in writes {
                match document {
                    Some(document) => collection_map.insert(key, document),
                    None => collection_map.remove(&key),
                };
            }
        }

        self.in_transaction = false;

        Ok(())
    }

    async fn abort_transaction(&mut self) -> DocumentStoreResult<()> {
        if !self.in_transaction {
            return Err(DocumentStoreError::Transaction("no transaction started".to_string()));
        }

        tracing::debug!(
            collections = self.staged.len(),
            "discarding staged transaction writes"
        );

        self.staged.clear();
        self.in_transaction = false;

        Ok(())
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
