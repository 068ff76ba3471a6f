//! `gcp-snippets`: run one Cloud Vision or Firestore sample.
//!
//! Log verbosity is controlled with `RUST_LOG`, e.g. `RUST_LOG=gcp_snippets_firestore=debug`.

mod cli;

use anyhow::Context;
use clap::Parser;
use gcp_snippets_firestore::database::Firestore;
use gcp_snippets_firestore::field_value::DocumentData;
use gcp_snippets_firestore::snippets::ManageDataSnippets;
use gcp_snippets_vision::snippets as vision;

use crate::cli::{Cli, Commands, FirestoreCommand, VisionCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Vision(command) => run_vision(command).await,
        Commands::Firestore(command) => run_firestore(command).await,
    }
}

async fn run_vision(command: VisionCommand) -> anyhow::Result<()> {
    match command {
        VisionCommand::DetectFacesGcs { gcs_path } => {
            vision::detect_faces_gcs(&gcs_path)
                .await
                .with_context(|| format!("detect faces in {gcs_path}"))?;
        }
        VisionCommand::DetectFaces { path } => {
            vision::detect_faces(&path)
                .await
                .with_context(|| format!("detect faces in {}", path.display()))?;
        }
    }
    Ok(())
}

async fn run_firestore(command: FirestoreCommand) -> anyhow::Result<()> {
    let database = Firestore::from_env().context("configure Firestore")?;
    let snippets = ManageDataSnippets::new(database);
    tracing::debug!(?command, "running Firestore sample");

    match command {
        FirestoreCommand::AddSimpleDocumentAsMap => {
            snippets.add_simple_document_as_map().await?;
        }
        FirestoreCommand::AddDocumentWithDifferentDataTypes => {
            snippets.add_document_with_different_data_types().await?;
        }
        FirestoreCommand::AddSimpleDocumentAsEntity => {
            snippets.add_simple_document_as_entity().await?;
        }
        FirestoreCommand::SetRequiresId { name, country } => {
            let data = DocumentData::new().with("name", name).with("country", country);
            let result = snippets.set_requires_id(data).await?;
            println!("Update time : {result}");
        }
        FirestoreCommand::AddDocumentDataWithAutoGeneratedId => {
            snippets.add_document_data_with_auto_generated_id().await?;
        }
        FirestoreCommand::AddDocumentDataAfterAutoGeneratingId => {
            snippets.add_document_data_after_auto_generating_id().await?;
        }
        FirestoreCommand::UpdateSimpleDocument => {
            snippets.update_simple_document().await?;
        }
        FirestoreCommand::UpdateUsingMap => {
            snippets.update_using_map().await?;
        }
        FirestoreCommand::UpdateAndCreateIfMissing => {
            snippets.update_and_create_if_missing().await?;
        }
        FirestoreCommand::UpdateNestedFields => {
            snippets.update_nested_fields().await?;
        }
        FirestoreCommand::UpdateServerTimestamp => {
            snippets.update_server_timestamp().await?;
        }
        FirestoreCommand::UpdateDocumentArray => {
            snippets.update_document_array().await?;
        }
        FirestoreCommand::DeleteFields => {
            snippets.delete_fields().await?;
        }
        FirestoreCommand::DeleteDocument => {
            snippets.delete_document().await?;
        }
        FirestoreCommand::DeleteCollection {
            collection,
            batch_size,
        } => {
            let collection = snippets.database().collection(&collection);
            let deleted = snippets.delete_collection(&collection, batch_size).await?;
            println!("Deleted {deleted} documents from {}", collection.path());
        }
        FirestoreCommand::RunSimpleTransaction => {
            snippets.run_simple_transaction().await?;
        }
        FirestoreCommand::ReturnInfoFromTransaction { population } => {
            snippets.return_info_from_transaction(population).await?;
        }
        FirestoreCommand::WriteBatch => {
            snippets.write_batch().await?;
        }
        FirestoreCommand::UpdateDocumentIncrement => {
            let result = snippets.update_document_increment().await?;
            println!("Update time : {result}");
        }
    }
    Ok(())
}
