//! Add, update, and delete samples.
//!
//! Every sample awaits each call before issuing the next one and prints a
//! status line such as `Update time : <timestamp>`. The value a caller needs to
//! verify the outcome is returned.

use gcp_snippets_core::error::{GcpError, GcpResult};

use crate::city::City;
use crate::database::Firestore;
use crate::field_value::{DocumentData, FieldValue};
use crate::reference::CollectionReference;
use crate::snapshot::DocumentSnapshot;
use crate::value::{Fields, Value};
use crate::write::{SetOptions, WriteResult};

/// Largest population `return_info_from_transaction` will write.
pub const MAX_POPULATION: i64 = 1_000_000;

/// Message of the domain error raised when the population cap would be exceeded.
pub const POPULATION_TOO_BIG: &str = "Sorry! Population is too big.";

/// Samples bound to one database.
#[derive(Debug, Clone)]
pub struct ManageDataSnippets {
    database: Firestore,
}

impl ManageDataSnippets {
    pub fn new(database: Firestore) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Firestore {
        &self.database
    }

    fn print_update_time(result: &WriteResult) {
        println!("Update time : {result}");
    }

    /// Add a document to a collection using a map.
    pub async fn add_simple_document_as_map(&self) -> GcpResult<DocumentData> {
        let doc_data = DocumentData::new()
            .with("name", "Los Angeles")
            .with("state", "CA")
            .with("country", "USA")
            .with("regions", vec!["west_coast", "socal"]);

        let result = self
            .database
            .collection("cities")
            .document("LA")
            .set(doc_data.clone())
            .await?;
        Self::print_update_time(&result);
        Ok(doc_data)
    }

    /// Add a document holding one field of each common type.
    #[allow(clippy::approx_constant)]
    pub async fn add_document_with_different_data_types(&self) -> GcpResult<DocumentData> {
        let object_example = Fields::from([
            ("a".to_string(), Value::Integer(5)),
            ("b".to_string(), Value::Boolean(true)),
        ]);
        let doc_data = DocumentData::new()
            .with("stringExample", "Hello, World")
            .with("booleanExample", false)
            .with("numberExample", 3.14159265)
            .with("nullExample", Value::Null)
            .with(
                "arrayExample",
                vec![Value::Integer(5), Value::Boolean(true), Value::from("hello")],
            )
            .with("objectExample", object_example);

        let result = self
            .database
            .collection("data")
            .document("one")
            .set(doc_data.clone())
            .await?;
        Self::print_update_time(&result);
        Ok(doc_data)
    }

    /// Add a document from a typed entity.
    pub async fn add_simple_document_as_entity(&self) -> GcpResult<City> {
        let city = City::with_details(
            "Los Angeles",
            "CA",
            "USA",
            false,
            3_900_000,
            &["west_coast", "socal"],
        );
        let result = self
            .database
            .collection("cities")
            .document("LA")
            .set(DocumentData::from_entity(&city)?)
            .await?;
        Self::print_update_time(&result);
        Ok(city)
    }

    /// `set` always targets an explicit document id.
    pub async fn set_requires_id(&self, data: DocumentData) -> GcpResult<WriteResult> {
        self.database
            .collection("cities")
            .document("new-city-id")
            .set(data)
            .await
    }

    /// Add a document and let the client pick its id.
    pub async fn add_document_data_with_auto_generated_id(&self) -> GcpResult<String> {
        let data = DocumentData::new()
            .with("name", "Tokyo")
            .with("country", "Japan");
        let added = self.database.collection("cities").add(data).await?;
        println!("Added document with ID: {}", added.id());
        Ok(added.id().to_string())
    }

    /// Generate an id first, write the document later.
    pub async fn add_document_data_after_auto_generating_id(&self) -> GcpResult<String> {
        let added = self.database.collection("cities").document_auto();
        println!("Added document with ID: {}", added.id());

        let result = added.set(DocumentData::from_entity(&City::default())?).await?;
        Self::print_update_time(&result);
        Ok(added.id().to_string())
    }

    async fn seed_city(&self, id: &str, city: &City) -> GcpResult<()> {
        self.database
            .collection("cities")
            .document(id)
            .set(DocumentData::from_entity(city)?)
            .await?;
        Ok(())
    }

    /// Update a single field of an existing document.
    pub async fn update_simple_document(&self) -> GcpResult<WriteResult> {
        self.seed_city("DC", &City::named("Washington D.C.")).await?;

        let doc_ref = self.database.collection("cities").document("DC");
        let result = doc_ref.update_field("capital", true).await?;
        println!("Write result: {result}");
        Ok(result)
    }

    /// Update several fields at once.
    pub async fn update_using_map(&self) -> GcpResult<WriteResult> {
        self.seed_city("DC", &City::named("Washington D.C.")).await?;

        let doc_ref = self.database.collection("cities").document("DC");
        let updates: [(&str, FieldValue); 3] = [
            ("name", "Washington D.C.".into()),
            ("country", "USA".into()),
            ("capital", true.into()),
        ];
        let result = doc_ref.update(updates).await?;
        Self::print_update_time(&result);
        Ok(result)
    }

    /// Merge a field into a document, creating it if it does not exist.
    pub async fn update_and_create_if_missing(&self) -> GcpResult<WriteResult> {
        let update = DocumentData::new().with("capital", true);
        let result = self
            .database
            .collection("cities")
            .document("BJ")
            .set_with_options(update, SetOptions::merge())
            .await?;
        Self::print_update_time(&result);
        Ok(result)
    }

    /// Update a field inside a nested map with a dotted path.
    pub async fn update_nested_fields(&self) -> GcpResult<WriteResult> {
        let frank_doc_ref = self.database.collection("users").document("frank");
        let favorites = DocumentData::new()
            .with("food", "Pizza")
            .with("color", "Blue")
            .with("subject", "Recess");
        let initial_data = DocumentData::new()
            .with("name", "Frank")
            .with("age", 12_i64)
            .with("favorites", favorites);
        frank_doc_ref.set(initial_data).await?;

        let updates: [(&str, FieldValue); 2] =
            [("age", 13_i64.into()), ("favorites.color", "Red".into())];
        let result = frank_doc_ref.update(updates).await?;
        Self::print_update_time(&result);
        Ok(result)
    }

    /// Set a field to the commit time.
    pub async fn update_server_timestamp(&self) -> GcpResult<WriteResult> {
        let doc_ref = self.database.collection("objects").document("some-id");
        doc_ref.set(DocumentData::new()).await?;

        let result = doc_ref
            .update_field("timestamp", FieldValue::server_timestamp())
            .await?;
        Self::print_update_time(&result);
        Ok(result)
    }

    /// Add to and remove from an array field atomically.
    ///
    /// `cities/DC` must already exist.
    pub async fn update_document_array(&self) -> GcpResult<Vec<WriteResult>> {
        let washington_ref = self.database.collection("cities").document("DC");

        let array_union = washington_ref
            .update_field("regions", FieldValue::array_union(["greater_virginia"]))
            .await?;
        Self::print_update_time(&array_union);

        let array_rm = washington_ref
            .update_field("regions", FieldValue::array_remove(["east_coast"]))
            .await?;
        Self::print_update_time(&array_rm);

        Ok(vec![array_union, array_rm])
    }

    /// Remove a field with the delete sentinel.
    pub async fn delete_fields(&self) -> GcpResult<WriteResult> {
        let city = City {
            capital: Some(true),
            ..City::named("Beijing")
        };
        self.seed_city("BJ", &city).await?;

        let doc_ref = self.database.collection("cities").document("BJ");
        let result = doc_ref.update([("capital", FieldValue::delete())]).await?;
        Self::print_update_time(&result);
        Ok(result)
    }

    /// Delete a whole document.
    pub async fn delete_document(&self) -> GcpResult<WriteResult> {
        self.seed_city("DC", &City::named("Washington, D.C.")).await?;

        let result = self
            .database
            .collection("cities")
            .document("DC")
            .delete()
            .await?;
        Self::print_update_time(&result);
        Ok(result)
    }

    /// Delete every document of a collection, `batch_size` documents at a time.
    ///
    /// Pages are fetched with a `limit batch_size` query and each document is
    /// deleted individually. A page shorter than `batch_size` is taken as the
    /// last one, so documents inserted concurrently may survive. The first
    /// failure stops the routine and is reported on stderr before being
    /// returned. Returns the number of documents deleted.
    #[tracing::instrument(
        name = "gcp::firestore::delete_collection",
        skip(self, collection),
        fields(collection = %collection.path())
    )]
    pub async fn delete_collection(
        &self,
        collection: &CollectionReference,
        batch_size: u32,
    ) -> GcpResult<usize> {
        match Self::delete_in_pages(collection, batch_size).await {
            Ok(deleted) => Ok(deleted),
            Err(e) => {
                tracing::error!(error = %e, "bulk delete stopped");
                eprintln!("Error deleting collection : {e}");
                Err(e)
            }
        }
    }

    async fn delete_in_pages(collection: &CollectionReference, batch_size: u32) -> GcpResult<usize> {
        if batch_size == 0 {
            return Err(GcpError::Builder("batch size must be at least 1".into()));
        }

        let mut total = 0;
        loop {
            let page = collection.limit(batch_size).get().await?;
            let mut deleted = 0;
            for document in &page {
                document.reference().delete().await?;
                deleted += 1;
            }
            total += deleted;
            tracing::debug!(deleted, total, "page deleted");

            if deleted < batch_size as usize {
                return Ok(total);
            }
        }
    }

    /// Increment a counter inside a transaction.
    pub async fn run_simple_transaction(&self) -> GcpResult<()> {
        let doc_ref = self.database.collection("cities").document("SF");
        let city = City {
            country: Some("USA".into()),
            population: Some(860_000),
            ..City::named("SF")
        };
        doc_ref.set(DocumentData::from_entity(&city)?).await?;

        self.database
            .run_transaction(|transaction| {
                let doc_ref = doc_ref.clone();
                async move {
                    let snapshot = transaction.get(&doc_ref).await?;
                    let new_population = incremented_population(&snapshot)?;
                    transaction.update(&doc_ref, [("population", new_population)])
                }
            })
            .await
    }

    /// Conditionally update inside a transaction and report the outcome.
    ///
    /// Seeds `cities/SF` with `population`. If the incremented value would
    /// exceed [`MAX_POPULATION`], or the stored population is missing, the
    /// transaction fails with [`GcpError::Aborted`] and nothing is written.
    pub async fn return_info_from_transaction(&self, population: i64) -> GcpResult<String> {
        let doc_ref = self.database.collection("cities").document("SF");
        doc_ref
            .set(DocumentData::new().with("population", population))
            .await?;

        let message = self
            .database
            .run_transaction(|transaction| {
                let doc_ref = doc_ref.clone();
                async move {
                    let snapshot = transaction.get(&doc_ref).await?;
                    let new_population = incremented_population(&snapshot)?;
                    if new_population <= MAX_POPULATION {
                        transaction.update(&doc_ref, [("population", new_population)])?;
                        Ok(format!("Population increased to {new_population}"))
                    } else {
                        Err(GcpError::Aborted(POPULATION_TOO_BIG.into()))
                    }
                }
            })
            .await?;

        println!("{message}");
        Ok(message)
    }

    /// Set, update, and delete three documents in one atomic batch.
    pub async fn write_batch(&self) -> GcpResult<Vec<WriteResult>> {
        self.seed_city("SF", &City::default()).await?;
        self.seed_city("LA", &City::default()).await?;

        let mut batch = self.database.batch();

        let nyc_ref = self.database.collection("cities").document("NYC");
        batch.set(&nyc_ref, DocumentData::from_entity(&City::default())?)?;

        let sf_ref = self.database.collection("cities").document("SF");
        batch.update(&sf_ref, [("population", 1_000_000_i64)])?;

        let la_ref = self.database.collection("cities").document("LA");
        batch.delete(&la_ref);

        let results = batch.commit().await?;
        for result in &results {
            Self::print_update_time(result);
        }
        Ok(results)
    }

    /// Atomically add 50 to a numeric field.
    pub async fn update_document_increment(&self) -> GcpResult<WriteResult> {
        let city = City {
            population: Some(100),
            ..Default::default()
        };
        self.seed_city("DC", &city).await?;

        let washington_ref = self.database.collection("cities").document("DC");
        washington_ref
            .update_field("population", FieldValue::increment(50_i64)?)
            .await
    }
}

/// The stored population plus one.
///
/// A missing or non-numeric population aborts the transaction instead of being
/// read as zero. Doubles are truncated toward zero.
fn incremented_population(snapshot: &DocumentSnapshot) -> GcpResult<i64> {
    let population = match snapshot.get("population") {
        Some(Value::Integer(i)) => *i,
        Some(Value::Double(d)) if d.is_finite() => *d as i64,
        _ => {
            return Err(GcpError::Aborted(format!(
                "{} has no numeric population",
                snapshot.reference().path()
            )))
        }
    };
    population
        .checked_add(1)
        .ok_or_else(|| GcpError::Aborted(POPULATION_TOO_BIG.into()))
}
