//! Read results.

use gcp_snippets_core::error::GcpResult;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::field_path::FieldPath;
use crate::reference::DocumentReference;
use crate::value::{from_fields, Fields, Value};

/// A document as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Document {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) fields: Fields,
    pub(crate) create_time: Option<String>,
    pub(crate) update_time: Option<String>,
}

/// The contents of a document at the time it was read.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    reference: DocumentReference,
    fields: Option<Fields>,
    create_time: Option<String>,
    update_time: Option<String>,
}

impl DocumentSnapshot {
    pub(crate) fn from_document(reference: DocumentReference, document: Document) -> Self {
        Self {
            reference,
            fields: Some(document.fields),
            create_time: document.create_time,
            update_time: document.update_time,
        }
    }

    pub(crate) fn missing(reference: DocumentReference) -> Self {
        Self {
            reference,
            fields: None,
            create_time: None,
            update_time: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.fields.is_some()
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    pub fn reference(&self) -> &DocumentReference {
        &self.reference
    }

    /// All fields, or `None` if the document does not exist.
    pub fn data(&self) -> Option<&Fields> {
        self.fields.as_ref()
    }

    pub fn create_time(&self) -> Option<&str> {
        self.create_time.as_deref()
    }

    pub fn update_time(&self) -> Option<&str> {
        self.update_time.as_deref()
    }

    /// Value at a dotted field path, descending into maps.
    pub fn get(&self, field_path: &str) -> Option<&Value> {
        let path = FieldPath::parse(field_path).ok()?;
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.fields.as_ref()?.get(first)?;
        for segment in rest {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    pub fn get_i64(&self, field_path: &str) -> Option<i64> {
        self.get(field_path).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, field_path: &str) -> Option<f64> {
        self.get(field_path).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, field_path: &str) -> Option<bool> {
        self.get(field_path).and_then(Value::as_bool)
    }

    pub fn get_str(&self, field_path: &str) -> Option<&str> {
        self.get(field_path).and_then(Value::as_str)
    }

    /// Deserialize the document into an entity; `None` if it does not exist.
    pub fn to_entity<T: DeserializeOwned>(&self) -> GcpResult<Option<T>> {
        self.fields.as_ref().map(from_fields).transpose()
    }
}

/// The documents returned by a query, in query order.
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshot {
    documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub(crate) fn new(documents: Vec<DocumentSnapshot>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

impl<'a> IntoIterator for &'a QuerySnapshot {
    type Item = &'a DocumentSnapshot;
    type IntoIter = std::slice::Iter<'a, DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_mock_db;
    use serde_json::json;
    use wiremock::MockServer;

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Favorites {
        food: String,
        color: String,
    }

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Person {
        name: String,
        age: i64,
        favorites: Favorites,
    }

    fn frank() -> Document {
        serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/users/frank",
            "fields": {
                "name": {"stringValue": "Frank"},
                "age": {"integerValue": "12"},
                "favorites": {"mapValue": {"fields": {
                    "food": {"stringValue": "Pizza"},
                    "color": {"stringValue": "Blue"}
                }}}
            },
            "createTime": "2024-05-01T12:00:00Z",
            "updateTime": "2024-05-02T12:00:00Z"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn typed_getters_walk_nested_maps() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);
        let snapshot = DocumentSnapshot::from_document(db.doc("users/frank"), frank());

        assert!(snapshot.exists());
        assert_eq!(snapshot.id(), "frank");
        assert_eq!(snapshot.get_i64("age"), Some(12));
        assert_eq!(snapshot.get_str("favorites.color"), Some("Blue"));
        assert_eq!(snapshot.get_str("favorites.missing"), None);
        assert_eq!(snapshot.get_str("age.nested"), None);
        assert_eq!(snapshot.get_bool("age"), None);
        assert_eq!(snapshot.update_time(), Some("2024-05-02T12:00:00Z"));
    }

    #[tokio::test]
    async fn to_entity_reads_nested_struct() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);
        let snapshot = DocumentSnapshot::from_document(db.doc("users/frank"), frank());

        let person: Person = snapshot.to_entity().unwrap().unwrap();
        assert_eq!(person.favorites.food, "Pizza");
        assert_eq!(person.age, 12);
    }

    #[tokio::test]
    async fn missing_snapshot_has_no_data() {
        let server = MockServer::start().await;
        let db = setup_mock_db(&server);
        let snapshot = DocumentSnapshot::missing(db.doc("users/ghost"));

        assert!(!snapshot.exists());
        assert!(snapshot.get("name").is_none());
        assert!(snapshot.to_entity::<Person>().unwrap().is_none());
    }

    #[test]
    fn document_without_fields_parses_as_empty() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/cities/empty"
        }))
        .unwrap();
        assert!(doc.fields.is_empty());
    }
}
