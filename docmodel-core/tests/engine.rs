use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use docmodel_core::{
    backend::{AggregateOptions, FindOptions, StoreBackend, StoreSession},
    error::{DocumentStoreError, DocumentStoreResult, ModelError},
    model::Model,
    query::Query,
    record::{DefaultFields, Record},
};
use serde::{Deserialize, Serialize};

type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum Failure {
    #[default]
    Never,
    StartSession,
    StartTransaction,
    Commit,
    Abort,
    Operations,
}

/// A backend that records every call it receives and answers from a script.
#[derive(Debug, Default)]
struct ScriptedBackend {
    calls: CallLog,
    failure: Failure,
    stored: Option<Document>,
    written: Mutex<Vec<Document>>,
}

impl ScriptedBackend {
    fn failing(failure: Failure) -> Self {
        Self { failure, ..Default::default() }
    }

    fn holding(document: Document) -> Self {
        Self { stored: Some(document), ..Default::default() }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn written(&self) -> Vec<Document> {
        self.written.lock().unwrap().clone()
    }

    fn record(&self, op: &str, collection: &str, session: &Option<&mut ScriptedSession>) -> DocumentStoreResult<()> {
        let scope = if session.is_some() { "session" } else { "plain" };
        self.calls.lock().unwrap().push(format!("{op}:{collection}:{scope}"));

        if self.failure == Failure::Operations {
            return Err(DocumentStoreError::Backend("connection reset".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for ScriptedBackend {
    type Session = ScriptedSession;

    async fn start_session(&self) -> DocumentStoreResult<Self::Session> {
        self.calls.lock().unwrap().push("start_session".to_string());

        if self.failure == Failure::StartSession {
            return Err(DocumentStoreError::Backend("no sessions".to_string()));
        }

        Ok(ScriptedSession { calls: Arc::clone(&self.calls), failure: self.failure })
    }

    async fn find(
        &self,
        collection: &str,
        _filter: Document,
        _options: FindOptions,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.record("find", collection, &session)?;
        Ok(self.stored.iter().cloned().collect())
    }

    async fn find_one(
        &self,
        collection: &str,
        _filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Option<Document>> {
        self.record("find_one", collection, &session)?;
        Ok(self.stored.clone())
    }

    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Bson> {
        self.record("insert_one", collection, &session)?;
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);
        self.written.lock().unwrap().push(document);
        Ok(id)
    }

    async fn replace_one(
        &self,
        collection: &str,
        _filter: Document,
        document: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64> {
        self.record("replace_one", collection, &session)?;
        self.written.lock().unwrap().push(document);
        Ok(1)
    }

    async fn delete_one(
        &self,
        collection: &str,
        _filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64> {
        self.record("delete_one", collection, &session)?;
        Ok(0)
    }

    async fn count(
        &self,
        collection: &str,
        _filter: Document,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<u64> {
        self.record("count", collection, &session)?;
        Ok(self.stored.iter().count() as u64)
    }

    async fn aggregate(
        &self,
        collection: &str,
        _pipeline: Vec<Document>,
        _options: AggregateOptions,
        session: Option<&mut Self::Session>,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.record("aggregate", collection, &session)?;
        Ok(vec![doc! { "total": 7 }])
    }
}

#[derive(Debug)]
struct ScriptedSession {
    calls: CallLog,
    failure: Failure,
}

impl ScriptedSession {
    fn step(&self, name: &str, fails_on: Failure) -> DocumentStoreResult<()> {
        self.calls.lock().unwrap().push(name.to_string());

        if self.failure == fails_on {
            return Err(DocumentStoreError::Transaction(format!("{name} failed")));
        }

        Ok(())
    }
}

#[async_trait]
impl StoreSession for ScriptedSession {
    async fn start_transaction(&mut self) -> DocumentStoreResult<()> {
        self.step("start_transaction", Failure::StartTransaction)
    }

    async fn commit_transaction(&mut self) -> DocumentStoreResult<()> {
        self.step("commit_transaction", Failure::Commit)
    }

    async fn abort_transaction(&mut self) -> DocumentStoreResult<()> {
        self.step("abort_transaction", Failure::Abort)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Note {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    id: Option<ObjectId>,
    created_at: Option<DateTime>,
    updated_at: Option<DateTime>,
    title: String,
}

impl Record for Note {
    fn collection() -> &'static str {
        "notes"
    }

    fn default_fields(&mut self) -> Option<&mut dyn DefaultFields> {
        Some(self)
    }
}

impl DefaultFields for Note {
    fn id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }

    fn created_at(&self) -> Option<DateTime> {
        self.created_at
    }

    fn set_created_at(&mut self, at: DateTime) {
        self.created_at = Some(at);
    }

    fn updated_at(&self) -> Option<DateTime> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: DateTime) {
        self.updated_at = Some(at);
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Unnamed {
    title: String,
}

impl Record for Unnamed {
    fn collection() -> &'static str {
        ""
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Internal {
    title: String,
}

impl Record for Internal {
    fn collection() -> &'static str {
        "system.profile"
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Total {
    total: i32,
}

#[tokio::test]
async fn test_unsupported_type_never_reaches_store() {
    let model = Model::new(ScriptedBackend::default());

    let err = model.get_many::<Unnamed>(None, 0, 10).await.unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedType(ref name) if name.ends_with("Unnamed")));

    let err = model.create(&mut Internal::default()).await.unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedType(_)));

    let err = model.count::<Internal>(Some("x")).await.unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedType(_)));

    let err = model.get_by_id::<Unnamed>("not-an-id").await.unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedType(_)));

    assert!(model.backend().calls().is_empty());
}

#[tokio::test]
async fn test_empty_id_list_skips_store() {
    let model = Model::new(ScriptedBackend::default());

    let notes = model.get_many_by_ids::<Note, &str>(&[]).await.unwrap();

    assert!(notes.is_empty());
    assert!(model.backend().calls().is_empty());
}

#[tokio::test]
async fn test_malformed_id_is_invalid_id() {
    let model = Model::new(ScriptedBackend::default());

    assert_eq!(
        model.get_by_id::<Note>("xyz").await.unwrap_err(),
        ModelError::InvalidId("xyz".to_string()),
    );
    assert!(matches!(
        model.update(&mut Note::default(), "xyz").await.unwrap_err(),
        ModelError::InvalidId(_)
    ));
    assert!(matches!(
        model.delete::<Note>("").await.unwrap_err(),
        ModelError::InvalidId(_)
    ));

    assert!(model.backend().calls().is_empty());
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let model = Model::new(ScriptedBackend::default());

    let err = model
        .get_by_id::<Note>(&ObjectId::new().to_hex())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(model.backend().calls(), vec!["find_one:notes:plain"]);
}

#[tokio::test]
async fn test_backend_failure_is_internal() {
    let model = Model::new(ScriptedBackend::failing(Failure::Operations));

    assert!(model.get_by_id::<Note>(&ObjectId::new().to_hex()).await.unwrap_err().is_internal());
    assert!(model.get_many::<Note>(None, 0, 0).await.unwrap_err().is_internal());
    assert!(model.count::<Note>(None).await.unwrap_err().is_internal());
    assert!(model.create(&mut Note::default()).await.unwrap_err().is_internal());
}

#[tokio::test]
async fn test_undecodable_document_is_internal() {
    let model = Model::new(ScriptedBackend::holding(doc! { "title": 42 }));

    let err = model.find_one::<Note>(&Query::new()).await.unwrap_err();

    assert!(err.is_internal());
}

#[tokio::test]
async fn test_create_stamps_default_fields() {
    let model = Model::new(ScriptedBackend::default());
    let mut note = Note { title: "draft".to_string(), ..Default::default() };

    let id = model.create(&mut note).await.unwrap();

    let assigned = note.id.expect("create assigns an id");
    assert_eq!(id, Bson::ObjectId(assigned));
    assert!(note.created_at.is_some());
    assert_eq!(note.created_at, note.updated_at);

    let written = model.backend().written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].get_object_id("_id").unwrap(), assigned);
    assert_eq!(written[0].get_datetime("created_at").unwrap(), &note.created_at.unwrap());
}

#[tokio::test]
async fn test_update_moves_updated_at_forward() {
    let model = Model::new(ScriptedBackend::default());
    let id = ObjectId::new();
    let future = DateTime::from_millis(DateTime::now().timestamp_millis() + 60_000);
    let mut note = Note {
        id: Some(id),
        created_at: Some(future),
        updated_at: Some(future),
        title: "edited".to_string(),
    };

    model.update(&mut note, &id.to_hex()).await.unwrap();

    let updated_at = note.updated_at.unwrap();
    assert!(updated_at > future);
    assert_eq!(note.created_at, Some(future));
    assert_eq!(
        model.backend().written()[0].get_datetime("updated_at").unwrap(),
        &updated_at
    );
}

#[tokio::test]
async fn test_aggregate_decodes_into_output_type() {
    let model = Model::new(ScriptedBackend::default());

    let totals = model
        .aggregate::<Note, Total>(vec![doc! { "$count": "total" }], AggregateOptions::default())
        .await
        .unwrap();

    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].total, 7);
}

#[tokio::test]
async fn test_transaction_routes_calls_through_session() {
    let model = Model::new(ScriptedBackend::default());

    let tx = model.start_transaction().await.unwrap();
    assert!(tx.is_transaction());
    assert!(!model.is_transaction());

    tx.count::<Note>(None).await.unwrap();
    tx.commit().await.unwrap();

    model.count::<Note>(None).await.unwrap();

    assert_eq!(
        model.backend().calls(),
        vec![
            "start_session",
            "start_transaction",
            "count:notes:session",
            "commit_transaction",
            "count:notes:plain",
        ]
    );
}

#[tokio::test]
async fn test_start_failures_are_internal() {
    let model = Model::new(ScriptedBackend::failing(Failure::StartSession));
    assert!(model.start_transaction().await.unwrap_err().is_internal());

    let model = Model::new(ScriptedBackend::failing(Failure::StartTransaction));
    assert!(model.start_transaction().await.unwrap_err().is_internal());
}

#[tokio::test]
async fn test_nested_transaction_is_internal() {
    let model = Model::new(ScriptedBackend::default());
    let tx = model.start_transaction().await.unwrap();

    assert!(tx.start_transaction().await.unwrap_err().is_internal());
    assert_eq!(
        model.backend().calls(),
        vec!["start_session", "start_transaction"]
    );
}

#[tokio::test]
async fn test_commit_failure_is_internal() {
    let model = Model::new(ScriptedBackend::failing(Failure::Commit));
    let tx = model.start_transaction().await.unwrap();

    assert!(tx.commit().await.unwrap_err().is_internal());
}

#[tokio::test]
async fn test_commit_without_transaction_is_internal() {
    let model = Model::new(ScriptedBackend::default());

    assert!(model.commit().await.unwrap_err().is_internal());
}

#[tokio::test]
async fn test_rollback_always_reports_internal() {
    let model = Model::new(ScriptedBackend::default());
    let tx = model.start_transaction().await.unwrap();

    assert_eq!(tx.rollback("validation failed").await, ModelError::Internal);

    let model = Model::new(ScriptedBackend::failing(Failure::Abort));
    let tx = model.start_transaction().await.unwrap();

    assert_eq!(tx.rollback(ModelError::NotFound).await, ModelError::Internal);
    assert_eq!(model.backend().calls().last().map(String::as_str), Some("abort_transaction"));
}
