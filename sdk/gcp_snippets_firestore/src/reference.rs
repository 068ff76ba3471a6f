//! Collection and document handles.
//!
//! References are plain paths bound to a [`Firestore`] handle; creating one
//! performs no I/O.

use gcp_snippets_core::error::GcpResult;

use crate::database::Firestore;
use crate::field_value::{DocumentData, FieldValue};
use crate::query::Query;
use crate::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::write::{self, SetOptions, Write, WriteResult};

/// Length of client-generated document ids.
pub const AUTO_ID_LEN: usize = 20;

/// A random 20-character alphanumeric document id.
pub fn auto_id() -> String {
    std::iter::repeat_with(fastrand::alphanumeric)
        .take(AUTO_ID_LEN)
        .collect()
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A named group of documents.
#[derive(Debug, Clone)]
pub struct CollectionReference {
    db: Firestore,
    path: String,
}

impl CollectionReference {
    pub(crate) fn new(db: Firestore, path: &str) -> Self {
        Self {
            db,
            path: normalize(path),
        }
    }

    /// The collection id (last path segment).
    pub fn id(&self) -> &str {
        last_segment(&self.path)
    }

    /// Path relative to the database root, e.g. `cities/SF/landmarks`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The document containing this subcollection, if any.
    pub fn parent(&self) -> Option<DocumentReference> {
        self.path
            .rsplit_once('/')
            .map(|(parent, _)| DocumentReference::new(self.db.clone(), parent))
    }

    /// Resource under which queries on this collection run.
    pub(crate) fn query_parent(&self) -> String {
        match self.parent() {
            Some(doc) => doc.name(),
            None => self.db.documents_path(),
        }
    }

    pub(crate) fn firestore(&self) -> &Firestore {
        &self.db
    }

    /// The document with the given id in this collection.
    pub fn document(&self, id: &str) -> DocumentReference {
        DocumentReference::new(self.db.clone(), &format!("{}/{id}", self.path))
    }

    /// A document with a freshly generated id; nothing is written yet.
    pub fn document_auto(&self) -> DocumentReference {
        self.document(&auto_id())
    }

    /// Create a new document with a generated id.
    #[tracing::instrument(name = "gcp::firestore::add", skip(self, data), fields(collection = %self.path))]
    pub async fn add(&self, data: impl Into<DocumentData>) -> GcpResult<DocumentReference> {
        let doc = self.document_auto();
        doc.create(data).await?;
        tracing::debug!(id = doc.id(), "document added");
        Ok(doc)
    }

    /// Query over this collection, returning at most `n` documents.
    pub fn limit(&self, n: u32) -> Query {
        Query::new(self.clone()).limit(n)
    }

    /// Every document in the collection.
    pub async fn get(&self) -> GcpResult<QuerySnapshot> {
        Query::new(self.clone()).get().await
    }
}

/// A single document location.
#[derive(Debug, Clone)]
pub struct DocumentReference {
    db: Firestore,
    path: String,
}

impl DocumentReference {
    pub(crate) fn new(db: Firestore, path: &str) -> Self {
        Self {
            db,
            path: normalize(path),
        }
    }

    /// The document id (last path segment).
    pub fn id(&self) -> &str {
        last_segment(&self.path)
    }

    /// Path relative to the database root, e.g. `cities/SF`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full resource name.
    pub fn name(&self) -> String {
        format!("{}/{}", self.db.documents_path(), self.path)
    }

    /// The collection holding this document.
    pub fn parent(&self) -> CollectionReference {
        let parent = self
            .path
            .rsplit_once('/')
            .map_or("", |(parent, _)| parent);
        CollectionReference::new(self.db.clone(), parent)
    }

    pub(crate) fn firestore(&self) -> &Firestore {
        &self.db
    }

    /// A subcollection of this document.
    pub fn collection(&self, id: &str) -> CollectionReference {
        CollectionReference::new(self.db.clone(), &format!("{}/{id}", self.path))
    }

    pub(crate) fn set_write(&self, data: impl Into<DocumentData>, options: SetOptions) -> GcpResult<Write> {
        write::set_write(self.name(), data.into(), options)
    }

    pub(crate) fn update_write<I, K, V>(&self, updates: I) -> GcpResult<Write>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        write::update_write(self.name(), write::parse_updates(updates)?)
    }

    pub(crate) fn delete_write(&self) -> Write {
        write::delete_write(self.name())
    }

    async fn commit_one(&self, write: Write) -> GcpResult<WriteResult> {
        let mut results = self.db.commit(std::slice::from_ref(&write), None).await?;
        Ok(results.pop().unwrap_or_default())
    }

    /// Overwrite the document, creating it if needed.
    #[tracing::instrument(name = "gcp::firestore::set", skip(self, data), fields(path = %self.path))]
    pub async fn set(&self, data: impl Into<DocumentData>) -> GcpResult<WriteResult> {
        self.commit_one(self.set_write(data, SetOptions::default())?)
            .await
    }

    /// Set with options; `SetOptions::merge()` only touches the given fields.
    #[tracing::instrument(name = "gcp::firestore::set", skip(self, data), fields(path = %self.path))]
    pub async fn set_with_options(
        &self,
        data: impl Into<DocumentData>,
        options: SetOptions,
    ) -> GcpResult<WriteResult> {
        self.commit_one(self.set_write(data, options)?).await
    }

    /// Create the document; fails with `ALREADY_EXISTS` if it is present.
    #[tracing::instrument(name = "gcp::firestore::create", skip(self, data), fields(path = %self.path))]
    pub async fn create(&self, data: impl Into<DocumentData>) -> GcpResult<WriteResult> {
        self.commit_one(write::create_write(self.name(), data.into())?)
            .await
    }

    /// Update fields of an existing document.
    ///
    /// Keys are dotted field paths; the call fails with `NOT_FOUND` if the
    /// document does not exist.
    #[tracing::instrument(name = "gcp::firestore::update", skip(self, updates), fields(path = %self.path))]
    pub async fn update<I, K, V>(&self, updates: I) -> GcpResult<WriteResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        self.commit_one(self.update_write(updates)?).await
    }

    /// Update a single field.
    pub async fn update_field(
        &self,
        field_path: &str,
        value: impl Into<FieldValue>,
    ) -> GcpResult<WriteResult> {
        let value: FieldValue = value.into();
        self.update([(field_path, value)]).await
    }

    /// Delete the document. Deleting a missing document succeeds.
    #[tracing::instrument(name = "gcp::firestore::delete", skip(self), fields(path = %self.path))]
    pub async fn delete(&self) -> GcpResult<WriteResult> {
        self.commit_one(self.delete_write()).await
    }

    /// Read the document.
    pub async fn get(&self) -> GcpResult<DocumentSnapshot> {
        self.db.get_document(self, None).await
    }
}

impl PartialEq for DocumentReference {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{commit_response, request_bodies, setup_mock_db, DOCUMENTS_URL, TEST_PROJECT};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn auto_ids_are_twenty_alphanumerics() {
        let id = auto_id();
        assert_eq!(id.len(), AUTO_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, auto_id());
    }

    #[tokio::test]
    async fn paths_and_names() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);

        let landmarks = db.collection("/cities/SF/landmarks/");
        assert_eq!(landmarks.path(), "cities/SF/landmarks");
        assert_eq!(landmarks.id(), "landmarks");
        assert_eq!(landmarks.parent().unwrap().path(), "cities/SF");
        assert_eq!(
            landmarks.query_parent(),
            format!("projects/{TEST_PROJECT}/databases/(default)/documents/cities/SF")
        );

        let cities = db.collection("cities");
        assert!(cities.parent().is_none());
        assert_eq!(cities.query_parent(), db.documents_path());

        let sf = cities.document("SF");
        assert_eq!(sf.id(), "SF");
        assert_eq!(sf.parent().path(), "cities");
        assert_eq!(sf.collection("landmarks").path(), "cities/SF/landmarks");
        assert_eq!(sf, db.doc("cities/SF"));
    }

    #[tokio::test]
    async fn set_commits_single_write() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:commit")))
            .respond_with(ResponseTemplate::new(200).set_body_json(commit_response(1)))
            .expect(1)
            .mount(&server)
            .await;

        let result = db
            .doc("cities/LA")
            .set(DocumentData::new().with("name", "Los Angeles"))
            .await
            .expect("should succeed");
        assert!(result.update_time.is_some());

        let bodies = request_bodies(&server, ":commit").await;
        assert_eq!(
            bodies[0]["writes"][0]["update"]["name"],
            json!(format!("projects/{TEST_PROJECT}/databases/(default)/documents/cities/LA"))
        );
        assert!(bodies[0].get("transaction").is_none());
    }

    #[tokio::test]
    async fn add_creates_with_generated_id() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:commit")))
            .respond_with(ResponseTemplate::new(200).set_body_json(commit_response(1)))
            .expect(1)
            .mount(&server)
            .await;

        let doc = db
            .collection("cities")
            .add(DocumentData::new().with("name", "Tokyo"))
            .await
            .expect("should succeed");
        assert_eq!(doc.id().len(), AUTO_ID_LEN);

        let bodies = request_bodies(&server, ":commit").await;
        let write = &bodies[0]["writes"][0];
        assert_eq!(write["currentDocument"], json!({"exists": false}));
        assert!(write["update"]["name"].as_str().unwrap().ends_with(doc.id()));
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:commit")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "status": "NOT_FOUND", "message": "No document to update"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = db
            .doc("cities/Nowhere")
            .update_field("capital", true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn invalid_update_is_rejected_before_sending() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = db
            .doc("cities/DC")
            .update(Vec::<(&str, FieldValue)>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, gcp_snippets_core::GcpError::Builder(_)));
    }

    #[tokio::test]
    async fn delete_sends_delete_write() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:commit")))
            .respond_with(ResponseTemplate::new(200).set_body_json(commit_response(1)))
            .expect(1)
            .mount(&server)
            .await;

        db.doc("cities/DC").delete().await.expect("should succeed");

        let bodies = request_bodies(&server, ":commit").await;
        assert_eq!(
            bodies[0]["writes"],
            json!([{"delete": format!("projects/{TEST_PROJECT}/databases/(default)/documents/cities/DC")}])
        );
    }
}
