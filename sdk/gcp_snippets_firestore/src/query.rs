//! Structured queries over a single collection.

use gcp_snippets_core::error::GcpResult;
use serde::{Deserialize, Serialize};

use crate::reference::CollectionReference;
use crate::snapshot::{Document, QuerySnapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionSelector {
    collection_id: String,
}

/// Wire form of a `runQuery` structured query.
///
/// Without an explicit ordering the service returns documents ordered by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct StructuredQuery {
    from: Vec<CollectionSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

impl StructuredQuery {
    pub(crate) fn collection_id(&self) -> &str {
        self.from.first().map_or("", |c| c.collection_id.as_str())
    }

    pub(crate) fn limit_value(&self) -> Option<u32> {
        self.limit
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunQueryRequest<'a> {
    pub(crate) structured_query: &'a StructuredQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) transaction: Option<&'a str>,
}

/// One element of the `runQuery` response stream. Progress-only elements carry
/// no document.
#[derive(Debug, Deserialize)]
pub(crate) struct RunQueryResponse {
    pub(crate) document: Option<Document>,
}

/// A query over one collection.
#[derive(Debug, Clone)]
pub struct Query {
    collection: CollectionReference,
    limit: Option<u32>,
}

impl Query {
    pub(crate) fn new(collection: CollectionReference) -> Self {
        Self {
            collection,
            limit: None,
        }
    }

    /// Return at most `n` documents.
    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub(crate) fn structured(&self) -> StructuredQuery {
        StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: self.collection.id().to_string(),
            }],
            limit: self.limit,
        }
    }

    /// Run the query.
    pub async fn get(&self) -> GcpResult<QuerySnapshot> {
        self.run(None).await
    }

    pub(crate) async fn run(&self, transaction: Option<&str>) -> GcpResult<QuerySnapshot> {
        let documents = self
            .collection
            .firestore()
            .run_query(&self.collection.query_parent(), &self.structured(), transaction)
            .await?;
        Ok(QuerySnapshot::new(documents))
    }
}
