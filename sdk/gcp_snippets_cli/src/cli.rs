//! Command-line definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gcp-snippets", version, about = "Run the Cloud Vision and Firestore samples", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cloud Vision samples
    #[command(subcommand)]
    Vision(VisionCommand),
    /// Firestore samples (configured from GOOGLE_CLOUD_PROJECT and friends)
    #[command(subcommand)]
    Firestore(FirestoreCommand),
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum VisionCommand {
    /// Detect faces in an image stored in Cloud Storage
    DetectFacesGcs {
        /// `gs://bucket/object` URI of the image
        gcs_path: String,
    },
    /// Detect faces in a local image file
    DetectFaces { path: PathBuf },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum FirestoreCommand {
    AddSimpleDocumentAsMap,
    AddDocumentWithDifferentDataTypes,
    AddSimpleDocumentAsEntity,
    /// Write `cities/new-city-id`
    SetRequiresId {
        #[arg(long, default_value = "Phuket")]
        name: String,
        #[arg(long, default_value = "Thailand")]
        country: String,
    },
    AddDocumentDataWithAutoGeneratedId,
    AddDocumentDataAfterAutoGeneratingId,
    UpdateSimpleDocument,
    UpdateUsingMap,
    UpdateAndCreateIfMissing,
    UpdateNestedFields,
    UpdateServerTimestamp,
    /// Requires `cities/DC` to exist
    UpdateDocumentArray,
    DeleteFields,
    DeleteDocument,
    /// Delete every document of a collection, page by page
    DeleteCollection {
        #[arg(default_value = "cities")]
        collection: String,
        #[arg(long, default_value_t = 100)]
        batch_size: u32,
    },
    RunSimpleTransaction,
    /// Increment `cities/SF` population unless it would exceed 1,000,000
    ReturnInfoFromTransaction {
        #[arg(long, default_value_t = 999_999)]
        population: i64,
    },
    WriteBatch,
    UpdateDocumentIncrement,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("gcp-snippets").chain(args.iter().copied()))
            .expect("should parse")
            .command
    }

    #[test]
    fn parses_vision_samples() {
        match parse(&["vision", "detect-faces-gcs", "gs://bucket/face.jpg"]) {
            Commands::Vision(cmd) => assert_eq!(
                cmd,
                VisionCommand::DetectFacesGcs {
                    gcs_path: "gs://bucket/face.jpg".into()
                }
            ),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn delete_collection_defaults() {
        match parse(&["firestore", "delete-collection"]) {
            Commands::Firestore(cmd) => assert_eq!(
                cmd,
                FirestoreCommand::DeleteCollection {
                    collection: "cities".into(),
                    batch_size: 100
                }
            ),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn delete_collection_with_name_and_batch_size() {
        match parse(&["firestore", "delete-collection", "users", "--batch-size", "25"]) {
            Commands::Firestore(cmd) => assert_eq!(
                cmd,
                FirestoreCommand::DeleteCollection {
                    collection: "users".into(),
                    batch_size: 25
                }
            ),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from([
            "gcp-snippets",
            "firestore",
            "delete-collection",
            "users",
            "--batch-size",
            "-1"
        ])
        .is_err());
    }

    #[test]
    fn transaction_population_flag() {
        match parse(&["firestore", "return-info-from-transaction", "--population", "1000000"]) {
            Commands::Firestore(cmd) => assert_eq!(
                cmd,
                FirestoreCommand::ReturnInfoFromTransaction {
                    population: 1_000_000
                }
            ),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_sample() {
        assert!(Cli::try_parse_from(["gcp-snippets", "firestore", "drop-database"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
