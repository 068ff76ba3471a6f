//! Integration tests for gcp_snippets_firestore.
//!
//! These tests require a Firestore emulator or a live project.
//! Run with: `cargo test --features integration-tests`
//!
//! Required environment variables:
//! - `GOOGLE_CLOUD_PROJECT`: project id
//! - `FIRESTORE_EMULATOR_HOST`: emulator address (or a credential for a live project)

#![cfg(feature = "integration-tests")]

use gcp_snippets_core::GcpError;
use gcp_snippets_firestore::city::City;
use gcp_snippets_firestore::database::Firestore;
use gcp_snippets_firestore::field_value::DocumentData;
use gcp_snippets_firestore::reference::auto_id;
use gcp_snippets_firestore::snippets::{ManageDataSnippets, POPULATION_TOO_BIG};

fn get_snippets() -> ManageDataSnippets {
    ManageDataSnippets::new(Firestore::from_env().expect("Failed to build Firestore handle"))
}

#[tokio::test]
async fn test_delete_collection_empties_collection() {
    let snippets = get_snippets();
    let collection = snippets
        .database()
        .collection(&format!("bulk-delete-{}", auto_id()));

    for i in 0..5 {
        collection
            .document(&format!("doc-{i}"))
            .set(DocumentData::new().with("index", i64::from(i)))
            .await
            .expect("seed document");
    }

    let deleted = snippets
        .delete_collection(&collection, 2)
        .await
        .expect("delete collection");
    assert_eq!(deleted, 5);

    let remaining = collection.get().await.expect("list collection");
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_delete_fields_removes_capital() {
    let snippets = get_snippets();
    snippets.delete_fields().await.expect("delete fields");

    let snapshot = snippets
        .database()
        .doc("cities/BJ")
        .get()
        .await
        .expect("get document");
    let city: City = snapshot.to_entity().expect("decode").expect("exists");
    assert_eq!(city.name.as_deref(), Some("Beijing"));
    assert_eq!(city.capital, None);
}

#[tokio::test]
async fn test_conditional_transaction() {
    let snippets = get_snippets();

    let message = snippets
        .return_info_from_transaction(999_999)
        .await
        .expect("transaction below cap");
    assert_eq!(message, "Population increased to 1000000");

    let err = snippets
        .return_info_from_transaction(1_000_000)
        .await
        .unwrap_err();
    assert!(matches!(err, GcpError::Aborted(ref m) if m == POPULATION_TOO_BIG));

    let snapshot = snippets
        .database()
        .doc("cities/SF")
        .get()
        .await
        .expect("get document");
    assert_eq!(snapshot.get_i64("population"), Some(1_000_000));
}

#[tokio::test]
async fn test_write_batch() {
    let snippets = get_snippets();
    let results = snippets.write_batch().await.expect("write batch");
    assert_eq!(results.len(), 3);

    let la = snippets.database().doc("cities/LA").get().await.expect("get LA");
    assert!(!la.exists());
    let sf = snippets.database().doc("cities/SF").get().await.expect("get SF");
    assert_eq!(sf.get_i64("population"), Some(1_000_000));
}
