//! Database handle and the raw document RPCs.

use gcp_snippets_core::auth::GcpCredential;
use gcp_snippets_core::client::GcpClient;
use gcp_snippets_core::error::{GcpError, GcpResult};

use crate::batch::WriteBatch;
use crate::query::{RunQueryRequest, RunQueryResponse, StructuredQuery};
use crate::reference::{CollectionReference, DocumentReference};
use crate::snapshot::{Document, DocumentSnapshot};
use crate::write::{CommitRequest, CommitResponse, Write, WriteResult};

/// Public Firestore endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Environment variable overriding the Firestore endpoint.
pub const ENDPOINT_ENV: &str = "FIRESTORE_ENDPOINT";

/// Environment variable naming a local emulator (`host:port`).
pub const EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";

/// Environment variable holding the project id.
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// Environment variable selecting a named database.
pub const DATABASE_ENV: &str = "FIRESTORE_DATABASE";

/// Id of the database every project starts with.
pub const DEFAULT_DATABASE: &str = "(default)";

/// A handle to one Firestore database.
///
/// Cloning is cheap; clones share the underlying HTTP connection pool.
#[derive(Debug, Clone)]
pub struct Firestore {
    client: GcpClient,
    project_id: String,
    database_id: String,
}

impl Firestore {
    /// Handle to the default database of `project_id`.
    pub fn new(client: GcpClient, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            database_id: DEFAULT_DATABASE.to_string(),
        }
    }

    /// Use a named database instead of `(default)`.
    pub fn with_database(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    /// Build a handle from the environment.
    ///
    /// When `FIRESTORE_EMULATOR_HOST` is set, requests go to the emulator over
    /// plain HTTP without real credentials. Otherwise the endpoint comes from
    /// `FIRESTORE_ENDPOINT` (or the public default) and the credential from
    /// `GOOGLE_API_KEY` / `GOOGLE_OAUTH_ACCESS_TOKEN`.
    pub fn from_env() -> GcpResult<Self> {
        let project_id = std::env::var(PROJECT_ENV).map_err(|_| {
            GcpError::MissingConfig(format!("{PROJECT_ENV} environment variable not set"))
        })?;

        let builder = match std::env::var(EMULATOR_HOST_ENV) {
            Ok(host) if !host.is_empty() => GcpClient::builder()
                .endpoint(format!("http://{host}"))
                .credential(GcpCredential::emulator()),
            _ => GcpClient::builder().endpoint(
                std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            ),
        };

        let database_id =
            std::env::var(DATABASE_ENV).unwrap_or_else(|_| DEFAULT_DATABASE.to_string());

        Ok(Self::new(builder.build()?, project_id).with_database(database_id))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn client(&self) -> &GcpClient {
        &self.client
    }

    /// `projects/{project}/databases/{database}`
    pub fn database_path(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database_id)
    }

    /// Resource name under which every document lives.
    pub fn documents_path(&self) -> String {
        format!("{}/documents", self.database_path())
    }

    /// A collection by slash-separated path, e.g. `cities` or `cities/SF/landmarks`.
    pub fn collection(&self, path: &str) -> CollectionReference {
        CollectionReference::new(self.clone(), path)
    }

    /// A document by slash-separated path, e.g. `cities/SF`.
    pub fn doc(&self, path: &str) -> DocumentReference {
        DocumentReference::new(self.clone(), path)
    }

    /// Start an empty write batch.
    pub fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.clone())
    }

    /// Commit writes atomically, optionally as the end of a transaction.
    #[tracing::instrument(
        name = "gcp::firestore::commit",
        skip(self, writes, transaction),
        fields(writes = writes.len(), transactional = transaction.is_some())
    )]
    pub(crate) async fn commit(
        &self,
        writes: &[Write],
        transaction: Option<&str>,
    ) -> GcpResult<Vec<WriteResult>> {
        tracing::debug!("committing writes");

        let body = CommitRequest {
            writes,
            transaction,
        };
        let response = self
            .client
            .post(&format!("/v1/{}:commit", self.documents_path()), &body)
            .await?;
        let commit: CommitResponse = response.json().await?;

        tracing::debug!(results = commit.write_results.len(), "commit complete");
        Ok(commit.write_results)
    }

    /// Fetch one document; a missing document yields a snapshot that does not exist.
    #[tracing::instrument(
        name = "gcp::firestore::get_document",
        skip(self, reference, transaction),
        fields(path = %reference.path())
    )]
    pub(crate) async fn get_document(
        &self,
        reference: &DocumentReference,
        transaction: Option<&str>,
    ) -> GcpResult<DocumentSnapshot> {
        let path = format!("/v1/{}", reference.name());
        let result = match transaction {
            Some(tx) => self.client.get_with_query(&path, &[("transaction", tx)]).await,
            None => self.client.get(&path).await,
        };

        match result {
            Ok(response) => {
                let document: Document = response.json().await?;
                Ok(DocumentSnapshot::from_document(reference.clone(), document))
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("document not found");
                Ok(DocumentSnapshot::missing(reference.clone()))
            }
            Err(e) => Err(e),
        }
    }

    /// Run a structured query under `parent` (a documents path or a document name).
    #[tracing::instrument(
        name = "gcp::firestore::run_query",
        skip(self, query, transaction),
        fields(collection = %query.collection_id(), limit = ?query.limit_value())
    )]
    pub(crate) async fn run_query(
        &self,
        parent: &str,
        query: &StructuredQuery,
        transaction: Option<&str>,
    ) -> GcpResult<Vec<DocumentSnapshot>> {
        let body = RunQueryRequest {
            structured_query: query,
            transaction,
        };
        let response = self
            .client
            .post(&format!("/v1/{parent}:runQuery"), &body)
            .await?;
        let results: Vec<RunQueryResponse> = response.json().await?;

        let documents = results
            .into_iter()
            .filter_map(|r| r.document)
            .map(|document| {
                let reference = self.reference_for_name(&document.name)?;
                Ok(DocumentSnapshot::from_document(reference, document))
            })
            .collect::<GcpResult<Vec<_>>>()?;

        tracing::debug!(count = documents.len(), "query returned documents");
        Ok(documents)
    }

    /// Map a full document resource name back to a reference in this database.
    pub(crate) fn reference_for_name(&self, name: &str) -> GcpResult<DocumentReference> {
        let prefix = format!("{}/", self.documents_path());
        name.strip_prefix(&prefix)
            .map(|path| self.doc(path))
            .ok_or_else(|| {
                GcpError::Builder(format!(
                    "document '{name}' does not belong to database '{}'",
                    self.database_path()
                ))
            })
    }
}
