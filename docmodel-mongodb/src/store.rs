use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document};
use mongodb::{
    Client, ClientSession, Collection as MongoCollection,
    error::Error as MongoError,
    options::{
        AggregateOptions as MongoAggregateOptions, ClientOptions, Credential,
        FindOptions as MongoFindOptions,
    },
};
use std::fmt;
use docmodel_core::{
    backend::{AggregateOptions, FindOptions, StoreBackend, StoreBackendBuilder, StoreSession},
    error::{DocumentStoreError, DocumentStoreResult},
};


fn backend_error(err: MongoError) -> DocumentStoreError {
    DocumentStoreError::Backend(err.to_string())
}

fn transaction_error(err: MongoError) -> DocumentStoreError {
    DocumentStoreError::Transaction(err.to_string())
}


#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    type Session = MongoDbSession;

    async fn start_session(&self) -> DocumentStoreResult<Self::Session> {
        Ok(MongoDbSession {
            inner: self.client
                .start_session()
                .await
                .map_err(backend_error)?,
        })
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut find_options = MongoFindOptions::default();

        find_options.skip = options.skip;
        find_options.limit = options.limit;
        find_options.sort = options.sort;

        let collection = self.get_collection(collection);

        match session {
            Some(session) => {
                let mut cursor = collection
                    .find(filter)
                    .with_options(find_options)
                    .session(&mut session.inner)
                    .await
                    .map_err(backend_error)?;

                cursor
                    .stream(&mut session.inner)
                    .try_collect::<Vec<Document>>()
                    .await
                    .map_err(backend_error)
            },
            None => collection
                .find(filter)
                .with_options(find_options)
                .await
                .map_err(backend_error)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(backend_error),
        }
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Option<Document>> {
        let collection = self.get_collection(collection);
        let action = collection.find_one(filter);

        match session {
            Some(session) => action.session(&mut session.inner).await,
            None => action.await,
        }
        .map_err(backend_error)
    }

    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Bson> {
        let collection = self.get_collection(collection);
        let action = collection.insert_one(document);

        Ok(
            match session {
                Some(session) => action.session(&mut session.inner).await,
                None => action.await,
            }
            .map_err(backend_error)?
            .inserted_id
        )
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64> {
        let collection = self.get_collection(collection);
        let action = collection.replace_one(filter, document);

        Ok(
            match session {
                Some(session) => action.session(&mut session.inner).await,
                None => action.await,
            }
            .map_err(backend_error)?
            .matched_count
        )
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64> {
        let collection = self.get_collection(collection);
        let action = collection.delete_one(filter);

        Ok(
            match session {
                Some(session) => action.session(&mut session.inner).await,
                None => action.await,
            }
            .map_err(backend_error)?
            .deleted_count
        )
    }

    async fn count(
        &self,
        collection: &str,
        filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64> {
        let collection = self.get_collection(collection);
        let action = collection.count_documents(filter);

        match session {
            Some(session) => action.session(&mut session.inner).await,
            None => action.await,
        }
        .map_err(backend_error)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        options: AggregateOptions,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut aggregate_options = MongoAggregateOptions::default();

        aggregate_options.allow_disk_use = options.allow_disk_use;
        aggregate_options.batch_size = options.batch_size;

        let collection = self.get_collection(collection);
        let action = collection
            .aggregate(pipeline)
            .with_options(aggregate_options);

        match session {
            Some(session) => {
                let mut cursor = action
                    .session(&mut session.inner)
                    .await
                    .map_err(backend_error)?;

                cursor
                    .stream(&mut session.inner)
                    .try_collect::<Vec<Document>>()
                    .await
                    .map_err(backend_error)
            },
            None => action
                .await
                .map_err(backend_error)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(backend_error),
        }
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}


/// A MongoDB client session. Transactions require a replica set or sharded cluster.
pub struct MongoDbSession {
    inner: ClientSession,
}

impl fmt::Debug for MongoDbSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoDbSession").finish_non_exhaustive()
    }
}

#[async_trait]
impl StoreSession for MongoDbSession {
    async fn start_transaction(&mut self) -> DocumentStoreResult<()> {
        self.inner
            .start_transaction()
            .await
            .map_err(transaction_error)
    }

    async fn commit_transaction(&mut self) -> DocumentStoreResult<()> {
        self.inner
            .commit_transaction()
            .await
            .map_err(transaction_error)
    }

    async fn abort_transaction(&mut self) -> DocumentStoreResult<()> {
        self.inner
            .abort_transaction()
            .await
            .map_err(transaction_error)
    }
}


pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    credential: Option<Credential>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            credential: None,
        }
    }

    /// Authenticates with `username` and `password` instead of credentials in the DSN.
    pub fn with_credential(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credential = Some(
            Credential::builder()
                .username(username.into())
                .password(password.into())
                .build(),
        );
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        if let Some(credential) = self.credential {
            options.credential = Some(credential);
        }

        tracing::debug!(database = %self.database, "connecting to mongodb");

        Ok(MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_does_not_connect() {
        let store = MongoDbStore::builder("mongodb://127.0.0.1:1/?replicaSet=rs0", "blog")
            .with_credential("admin", "secret")
            .build()
            .await
            .unwrap();

        let collection = store.get_collection("posts");

        assert_eq!(collection.name(), "posts");
        assert_eq!(collection.namespace().db, "blog");
        assert!(store.client().default_database().is_none());
    }

    #[tokio::test]
    async fn test_malformed_dsn_fails_initialization() {
        let err = MongoDbStoreBuilder::new("localhost:27017", "blog")
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Initialization(_)));
    }
}
