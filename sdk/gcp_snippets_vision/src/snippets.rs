//! Face detection samples.
//!
//! Each sample builds one FACE_DETECTION request, submits it, and prints one
//! block per detected face (or one `Error: ...` line per failed image). The
//! printed blocks are also returned.

use std::path::Path;

use gcp_snippets_core::client::GcpClient;
use gcp_snippets_core::error::GcpResult;

use crate::annotate::{
    self, AnnotateImageRequest, AnnotateImageResponse, FaceAnnotation, Feature, FeatureType, Image,
};

/// Format the attributes of one detected face.
pub fn format_face(face: &FaceAnnotation) -> String {
    format!(
        "anger: {}\njoy: {}\nsurprise: {}\nposition: {}",
        face.anger_likelihood, face.joy_likelihood, face.surprise_likelihood, face.bounding_poly
    )
}

/// Print and collect the report for every image response.
///
/// A failed image contributes a single `Error: <message>` entry and the
/// remaining responses are still reported.
pub fn report_faces(responses: &[AnnotateImageResponse]) -> Vec<String> {
    let mut lines = Vec::new();
    for res in responses {
        if let Some(error) = &res.error {
            let line = format!("Error: {}", error.message);
            println!("{line}");
            lines.push(line);
            continue;
        }

        for face in &res.face_annotations {
            let block = format_face(face);
            println!("{block}");
            lines.push(block);
        }
    }
    lines
}

async fn detect_faces_in(client: &GcpClient, image: Image) -> GcpResult<Vec<String>> {
    let request = AnnotateImageRequest::builder()
        .image(image)
        .feature(Feature::new(FeatureType::FaceDetection))
        .build()?;

    let response = annotate::batch_annotate_images(client, &[request]).await?;
    Ok(report_faces(&response.responses))
}

/// Detects faces in the specified remote image on Cloud Storage.
///
/// The client is created from the environment for the duration of the call.
pub async fn detect_faces_gcs(gcs_path: &str) -> GcpResult<Vec<String>> {
    let client = annotate::client_from_env()?;
    detect_faces_gcs_with(&client, gcs_path).await
}

/// Same as [`detect_faces_gcs`], with a caller-provided client.
#[tracing::instrument(name = "gcp::vision::detect_faces_gcs", skip(client))]
pub async fn detect_faces_gcs_with(client: &GcpClient, gcs_path: &str) -> GcpResult<Vec<String>> {
    detect_faces_in(client, Image::gcs(gcs_path)).await
}

/// Detects faces in a local image file, sent inline.
pub async fn detect_faces(file_path: impl AsRef<Path>) -> GcpResult<Vec<String>> {
    let client = annotate::client_from_env()?;
    detect_faces_with(&client, file_path).await
}

/// Same as [`detect_faces`], with a caller-provided client.
pub async fn detect_faces_with(
    client: &GcpClient,
    file_path: impl AsRef<Path>,
) -> GcpResult<Vec<String>> {
    let file_path = file_path.as_ref();
    tracing::debug!(path = %file_path.display(), "reading image");

    let content = tokio::fs::read(file_path).await?;
    detect_faces_in(client, Image::bytes(content)).await
}
