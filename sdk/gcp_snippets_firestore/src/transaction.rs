//! Read-write transactions.
//!
//! [`Firestore::run_transaction`] runs a body against a server transaction.
//! Reads go to the server tagged with the transaction id; writes are buffered
//! locally and sent with the final commit. A commit rejected with `ABORTED`
//! (contention) reruns the body in a fresh transaction.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use gcp_snippets_core::error::{GcpError, GcpResult};
use serde::{Deserialize, Serialize};

use crate::database::Firestore;
use crate::field_value::{DocumentData, FieldValue};
use crate::query::Query;
use crate::reference::DocumentReference;
use crate::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::write::{SetOptions, Write};

/// Default number of attempts before a contended transaction gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Options for [`Firestore::run_transaction_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    max_attempts: u32,
    read_only: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            read_only: false,
        }
    }
}

impl TransactionOptions {
    /// Total attempts, including the first one.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Run as a read-only transaction; writes are rejected.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadWrite<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_transaction: Option<&'a str>,
}

#[derive(Serialize)]
struct ReadOnly {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum TransactionMode<'a> {
    ReadWrite(ReadWrite<'a>),
    ReadOnly(ReadOnly),
}

#[derive(Serialize)]
struct BeginTransactionRequest<'a> {
    options: TransactionMode<'a>,
}

#[derive(Deserialize)]
struct BeginTransactionResponse {
    transaction: String,
}

#[derive(Serialize)]
struct RollbackRequest<'a> {
    transaction: &'a str,
}

/// A transaction handle passed to the body of [`Firestore::run_transaction`].
///
/// All reads must happen before the first write.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: String,
    read_only: bool,
    writes: Arc<Mutex<Vec<Write>>>,
}

impl Transaction {
    fn new(id: String, read_only: bool) -> Self {
        Self {
            id,
            read_only,
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Server-assigned transaction id.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn buffered(&self) -> std::sync::MutexGuard<'_, Vec<Write>> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_no_writes(&self) -> GcpResult<()> {
        if self.buffered().is_empty() {
            Ok(())
        } else {
            Err(GcpError::Builder(
                "transactions require all reads to happen before any write".into(),
            ))
        }
    }

    fn push(&self, write: Write) -> GcpResult<()> {
        if self.read_only {
            return Err(GcpError::Builder(
                "cannot write in a read-only transaction".into(),
            ));
        }
        self.buffered().push(write);
        Ok(())
    }

    fn take_writes(&self) -> Vec<Write> {
        std::mem::take(&mut *self.buffered())
    }

    /// Read a document within the transaction.
    pub async fn get(&self, doc: &DocumentReference) -> GcpResult<DocumentSnapshot> {
        self.ensure_no_writes()?;
        doc.firestore().get_document(doc, Some(&self.id)).await
    }

    /// Run a query within the transaction.
    pub async fn get_query(&self, query: &Query) -> GcpResult<QuerySnapshot> {
        self.ensure_no_writes()?;
        query.run(Some(&self.id)).await
    }

    pub fn set(&self, doc: &DocumentReference, data: impl Into<DocumentData>) -> GcpResult<()> {
        self.push(doc.set_write(data, SetOptions::default())?)
    }

    pub fn set_with_options(
        &self,
        doc: &DocumentReference,
        data: impl Into<DocumentData>,
        options: SetOptions,
    ) -> GcpResult<()> {
        self.push(doc.set_write(data, options)?)
    }

    pub fn update<I, K, V>(&self, doc: &DocumentReference, updates: I) -> GcpResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        self.push(doc.update_write(updates)?)
    }

    pub fn delete(&self, doc: &DocumentReference) -> GcpResult<()> {
        self.push(doc.delete_write())
    }
}

impl Firestore {
    #[tracing::instrument(name = "gcp::firestore::begin_transaction", skip(self))]
    async fn begin_transaction(&self, retry: Option<&str>, read_only: bool) -> GcpResult<String> {
        let options = if read_only {
            TransactionMode::ReadOnly(ReadOnly {})
        } else {
            TransactionMode::ReadWrite(ReadWrite {
                retry_transaction: retry,
            })
        };
        let response = self
            .client()
            .post(
                &format!("/v1/{}:beginTransaction", self.documents_path()),
                &BeginTransactionRequest { options },
            )
            .await?;
        let begun: BeginTransactionResponse = response.json().await?;
        Ok(begun.transaction)
    }

    #[tracing::instrument(name = "gcp::firestore::rollback", skip(self))]
    async fn rollback(&self, transaction: &str) -> GcpResult<()> {
        self.client()
            .post(
                &format!("/v1/{}:rollback", self.documents_path()),
                &RollbackRequest { transaction },
            )
            .await?;
        Ok(())
    }

    async fn rollback_quietly(&self, transaction: &str) {
        if let Err(e) = self.rollback(transaction).await {
            tracing::warn!(error = %e, "rollback failed");
        }
    }

    /// Run `body` in a read-write transaction with default options.
    ///
    /// The body may run more than once and must only have effects through the
    /// [`Transaction`] it receives. An error returned by the body rolls the
    /// transaction back and is returned unchanged.
    pub async fn run_transaction<T, F, Fut>(&self, body: F) -> GcpResult<T>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = GcpResult<T>>,
    {
        self.run_transaction_with_options(TransactionOptions::default(), body)
            .await
    }

    #[tracing::instrument(name = "gcp::firestore::run_transaction", skip(self, body))]
    pub async fn run_transaction_with_options<T, F, Fut>(
        &self,
        options: TransactionOptions,
        mut body: F,
    ) -> GcpResult<T>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = GcpResult<T>>,
    {
        if options.max_attempts == 0 {
            return Err(GcpError::Builder("max_attempts must be at least 1".into()));
        }

        let mut previous: Option<String> = None;
        let mut attempt = 1;
        loop {
            let id = self
                .begin_transaction(previous.as_deref(), options.read_only)
                .await?;
            tracing::debug!(attempt, "transaction started");

            let transaction = Transaction::new(id, options.read_only);
            let outcome = body(transaction.clone()).await;

            let err = match outcome {
                Ok(value) => {
                    let writes = transaction.take_writes();
                    match self.commit(&writes, Some(transaction.id())).await {
                        Ok(_) => return Ok(value),
                        Err(e) => e,
                    }
                }
                Err(e) => {
                    self.rollback_quietly(transaction.id()).await;
                    e
                }
            };

            if !err.is_aborted_by_server() || attempt >= options.max_attempts {
                return Err(err);
            }

            tracing::warn!(attempt, error = %err, "transaction contended, retrying");
            previous = Some(transaction.id().to_string());
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        commit_response, document_json, request_bodies, setup_mock_db, InTransaction,
        DOCUMENTS_URL,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_begin(server: &MockServer, id: &str) {
        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:beginTransaction")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transaction": id})))
            .mount(server)
            .await;
    }

    #[test]
    fn begin_request_wire_forms() {
        let fresh = BeginTransactionRequest {
            options: TransactionMode::ReadWrite(ReadWrite {
                retry_transaction: None,
            }),
        };
        assert_eq!(
            serde_json::to_value(&fresh).unwrap(),
            json!({"options": {"readWrite": {}}})
        );

        let retry = BeginTransactionRequest {
            options: TransactionMode::ReadWrite(ReadWrite {
                retry_transaction: Some("old"),
            }),
        };
        assert_eq!(
            serde_json::to_value(&retry).unwrap(),
            json!({"options": {"readWrite": {"retryTransaction": "old"}}})
        );

        let read_only = BeginTransactionRequest {
            options: TransactionMode::ReadOnly(ReadOnly {}),
        };
        assert_eq!(
            serde_json::to_value(&read_only).unwrap(),
            json!({"options": {"readOnly": {}}})
        );
    }

    #[tokio::test]
    async fn commits_buffered_writes_with_transaction_id() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);
        mount_begin(&server, "tx-1").await;

        Mock::given(method("GET"))
            .and(path(format!("{DOCUMENTS_URL}/cities/SF")))
            .and(query_param("transaction", "tx-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document_json(
                "cities/SF",
                json!({"population": {"integerValue": "10"}}),
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:commit")))
            .and(InTransaction(true))
            .respond_with(ResponseTemplate::new(200).set_body_json(commit_response(1)))
            .expect(1)
            .mount(&server)
            .await;

        let sf = db.doc("cities/SF");
        let population = db
            .run_transaction(|tx| {
                let sf = sf.clone();
                async move {
                    let snapshot = tx.get(&sf).await?;
                    let next = snapshot.get_i64("population").unwrap_or(0) + 1;
                    tx.update(&sf, [("population", next)])?;
                    Ok(next)
                }
            })
            .await
            .expect("should succeed");
        assert_eq!(population, 11);

        let bodies = request_bodies(&server, ":commit").await;
        assert_eq!(bodies[0]["transaction"], "tx-1");
        assert_eq!(
            bodies[0]["writes"][0]["update"]["fields"]["population"],
            json!({"integerValue": "11"})
        );
    }

    #[tokio::test]
    async fn body_error_rolls_back_without_commit() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);
        mount_begin(&server, "tx-2").await;

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:rollback")))
            .and(body_json(json!({"transaction": "tx-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:commit")))
            .respond_with(ResponseTemplate::new(200).set_body_json(commit_response(0)))
            .expect(0)
            .mount(&server)
            .await;

        let err = db
            .run_transaction(|_tx| async { Err::<(), _>(GcpError::Aborted("nope".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, GcpError::Aborted(ref m) if m == "nope"));
    }

    #[tokio::test]
    async fn aborted_commit_is_retried_with_previous_id() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:beginTransaction")))
            .and(body_json(json!({"options": {"readWrite": {}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transaction": "first"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:beginTransaction")))
            .and(body_json(json!({"options": {"readWrite": {"retryTransaction": "first"}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transaction": "second"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:commit")))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": 409, "status": "ABORTED", "message": "Too much contention"}
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:commit")))
            .respond_with(ResponseTemplate::new(200).set_body_json(commit_response(1)))
            .expect(1)
            .mount(&server)
            .await;

        let runs = AtomicU32::new(0);
        let doc = db.doc("cities/SF");
        db.run_transaction(|tx| {
            runs.fetch_add(1, Ordering::SeqCst);
            let doc = doc.clone();
            async move { tx.update(&doc, [("capital", false)]) }
        })
        .await
        .expect("second attempt should commit");

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);
        mount_begin(&server, "tx").await;

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:commit")))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": 409, "status": "ABORTED", "message": "Too much contention"}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let err = db
            .run_transaction_with_options(TransactionOptions::default().max_attempts(2), |_tx| async {
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_aborted_by_server());
    }

    #[tokio::test]
    async fn reads_after_writes_are_rejected() {
        let tx = Transaction::new("tx".into(), false);
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);
        let doc = db.doc("cities/SF");

        tx.delete(&doc).unwrap();
        let err = tx.get(&doc).await.unwrap_err();
        assert!(matches!(err, GcpError::Builder(_)));
    }

    #[tokio::test]
    async fn read_only_transaction_rejects_writes() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);

        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:beginTransaction")))
            .and(body_json(json!({"options": {"readOnly": {}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transaction": "ro"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS_URL}:rollback")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let doc = db.doc("cities/SF");
        let err = db
            .run_transaction_with_options(TransactionOptions::default().read_only(), |tx| {
                let doc = doc.clone();
                async move { tx.delete(&doc) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GcpError::Builder(_)));
    }

    #[tokio::test]
    async fn zero_attempts_is_rejected() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);

        let err = db
            .run_transaction_with_options(TransactionOptions::default().max_attempts(0), |_tx| async {
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GcpError::Builder(_)));
    }
}
