//! Collection handles resolved per operation.
//!
//! The engine is generic over record types, so it never caches a collection: each
//! operation resolves a [`Collection`] from the record's contract, issues one store
//! call through it under the engine's execution context, and drops it.

use bson::{Bson, Document};

use crate::{
    backend::{AggregateOptions, FindOptions, StoreBackend},
    context::ExecutionContext,
    error::DocumentStoreResult,
};

/// A collection name bound to a backend and an execution context.
#[derive(Debug)]
pub(crate) struct Collection<'a, B: StoreBackend> {
    name: &'static str,
    backend: &'a B,
    context: &'a ExecutionContext<B::Session>,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(
        name: &'static str,
        backend: &'a B,
        context: &'a ExecutionContext<B::Session>,
    ) -> Self {
        Self { name, backend, context }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) async fn find(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut session = self.context.session().await;

        self.backend
            .find(self.name, filter, options, session.as_deref_mut())
            .await
    }

    pub(crate) async fn find_one(&self, filter: Document) -> DocumentStoreResult<Option<Document>> {
        let mut session = self.context.session().await;

        self.backend
            .find_one(self.name, filter, session.as_deref_mut())
            .await
    }

    pub(crate) async fn insert_one(&self, document: Document) -> DocumentStoreResult<Bson> {
        let mut session = self.context.session().await;

        self.backend
            .insert_one(self.name, document, session.as_deref_mut())
            .await
    }

    pub(crate) async fn replace_one(
        &self,
        filter: Document,
        document: Document,
    ) -> DocumentStoreResult<u64> {
        let mut session = self.context.session().await;

        self.backend
            .replace_one(self.name, filter, document, session.as_deref_mut())
            .await
    }

    pub(crate) async fn delete_one(&self, filter: Document) -> DocumentStoreResult<u64> {
        let mut session = self.context.session().await;

        self.backend
            .delete_one(self.name, filter, session.as_deref_mut())
            .await
    }

    pub(crate) async fn count(&self, filter: Document) -> DocumentStoreResult<u64> {
        let mut session = self.context.session().await;

        self.backend
            .count(self.name, filter, session.as_deref_mut())
            .await
    }

    pub(crate) async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut session = self.context.session().await;

        self.backend
            .aggregate(self.name, pipeline, options, session.as_deref_mut())
            .await
    }
}
