//! Atomic multi-document writes.

use gcp_snippets_core::error::GcpResult;

use crate::database::Firestore;
use crate::field_value::{DocumentData, FieldValue};
use crate::reference::DocumentReference;
use crate::write::{self, SetOptions, Write, WriteResult};

/// Accumulates writes and submits them in one commit.
///
/// Either every staged write is applied or none is. Staging methods validate
/// eagerly, so an invalid write is reported before anything is sent.
#[derive(Debug)]
pub struct WriteBatch {
    db: Firestore,
    writes: Vec<Write>,
}

impl WriteBatch {
    pub(crate) fn new(db: Firestore) -> Self {
        Self {
            db,
            writes: Vec::new(),
        }
    }

    pub fn set(&mut self, doc: &DocumentReference, data: impl Into<DocumentData>) -> GcpResult<&mut Self> {
        self.set_with_options(doc, data, SetOptions::default())
    }

    pub fn set_with_options(
        &mut self,
        doc: &DocumentReference,
        data: impl Into<DocumentData>,
        options: SetOptions,
    ) -> GcpResult<&mut Self> {
        self.writes.push(doc.set_write(data, options)?);
        Ok(self)
    }

    pub fn create(&mut self, doc: &DocumentReference, data: impl Into<DocumentData>) -> GcpResult<&mut Self> {
        self.writes.push(write::create_write(doc.name(), data.into())?);
        Ok(self)
    }

    pub fn update<I, K, V>(&mut self, doc: &DocumentReference, updates: I) -> GcpResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        self.writes.push(doc.update_write(updates)?);
        Ok(self)
    }

    pub fn delete(&mut self, doc: &DocumentReference) -> &mut Self {
        self.writes.push(doc.delete_write());
        self
    }

    /// Number of staged writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Submit every staged write; one result per write, in staging order.
    #[tracing::instrument(name = "gcp::firestore::batch_commit", skip(self), fields(writes = self.writes.len()))]
    pub async fn commit(self) -> GcpResult<Vec<WriteResult>> {
        self.db.commit(&self.writes, None).await
    }
}
