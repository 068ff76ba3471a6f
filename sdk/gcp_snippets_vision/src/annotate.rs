//! Image annotation client for the Cloud Vision API.
//!
//! This module builds `images:annotate` requests (an image source plus the
//! features to detect), submits them synchronously, and exposes the per-image
//! responses in request order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gcp_snippets_core::client::GcpClient;
//! use gcp_snippets_core::auth::GcpCredential;
//! use gcp_snippets_vision::annotate::{self, AnnotateImageRequest, Feature, FeatureType, Image};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GcpClient::builder()
//!     .endpoint("https://vision.googleapis.com")
//!     .credential(GcpCredential::api_key("your-key"))
//!     .build()?;
//!
//! let request = AnnotateImageRequest::builder()
//!     .image(Image::gcs("gs://bucket/face.jpg"))
//!     .feature(Feature::new(FeatureType::FaceDetection))
//!     .build()?;
//!
//! let response = annotate::batch_annotate_images(&client, &[request]).await?;
//! println!("{} faces", response.responses[0].face_annotations.len());
//! # Ok(())
//! # }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use gcp_snippets_core::auth::GcpCredential;
use gcp_snippets_core::client::GcpClient;
use gcp_snippets_core::error::{GcpError, GcpResult};
use serde::{Deserialize, Serialize, Serializer};

use crate::models::{BoundingPoly, Likelihood, Position, Status, ANNOTATE_PATH, MAX_IMAGES_PER_REQUEST};

/// Public Cloud Vision endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com";

/// Environment variable overriding [`DEFAULT_ENDPOINT`].
pub const ENDPOINT_ENV: &str = "GOOGLE_CLOUD_VISION_ENDPOINT";

/// Build a Vision client from the environment.
///
/// Uses `GOOGLE_CLOUD_VISION_ENDPOINT` when set, the public endpoint otherwise,
/// and [`GcpCredential::from_env`] for the credential.
pub fn client_from_env() -> GcpResult<GcpClient> {
    let endpoint = std::env::var(ENDPOINT_ENV)
        .ok()
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    GcpClient::builder()
        .endpoint(endpoint)
        .credential(GcpCredential::from_env()?)
        .build()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// The kind of annotation to run on an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    /// Run face detection.
    FaceDetection,
    /// Run landmark detection.
    LandmarkDetection,
    /// Run logo detection.
    LogoDetection,
    /// Run label detection.
    LabelDetection,
    /// Run text detection / OCR.
    TextDetection,
    /// Run dense text document OCR.
    DocumentTextDetection,
    /// Run Safe Search to detect potentially unsafe content.
    SafeSearchDetection,
    /// Compute image properties such as dominant colors.
    ImageProperties,
    /// Run crop hints.
    CropHints,
    /// Run web detection.
    WebDetection,
    /// Run localizer for object detection.
    ObjectLocalization,
}

/// A feature to extract, with an optional cap on the number of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
}

impl Feature {
    /// Create a feature with the service's default result limit.
    pub fn new(feature_type: FeatureType) -> Self {
        Self {
            feature_type,
            max_results: None,
        }
    }

    /// Limit the number of results returned for this feature.
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// Remote location of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcs_image_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
}

/// The image to annotate: a remote source or inline bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_content"
    )]
    content: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<ImageSource>,
}

fn serialize_content<S: Serializer>(content: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
    match content {
        Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
        None => serializer.serialize_none(),
    }
}

impl Image {
    /// An image stored in Cloud Storage (`gs://bucket/object`).
    pub fn gcs(uri: impl Into<String>) -> Self {
        Self {
            content: None,
            source: Some(ImageSource {
                gcs_image_uri: Some(uri.into()),
                image_uri: None,
            }),
        }
    }

    /// An image reachable over HTTP(S).
    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            content: None,
            source: Some(ImageSource {
                gcs_image_uri: None,
                image_uri: Some(uri.into()),
            }),
        }
    }

    /// An image sent inline; encoded as base64 on the wire.
    pub fn bytes(content: impl Into<Bytes>) -> Self {
        Self {
            content: Some(content.into()),
            source: None,
        }
    }

    /// Returns the Cloud Storage URI, if this image has one.
    pub fn gcs_uri(&self) -> Option<&str> {
        self.source.as_ref()?.gcs_image_uri.as_deref()
    }

    fn validate(&self) -> GcpResult<()> {
        if let Some(content) = &self.content {
            if content.is_empty() {
                return Err(GcpError::Builder("image content is empty".into()));
            }
        }
        if let Some(source) = &self.source {
            match (&source.gcs_image_uri, &source.image_uri) {
                (Some(gcs), _) if !gcs.starts_with("gs://") => {
                    return Err(GcpError::Builder(format!(
                        "gcs image uri must start with gs://, got {gcs}"
                    )));
                }
                (_, Some(uri)) if uri.is_empty() => {
                    return Err(GcpError::Builder("image uri is empty".into()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// A request to annotate one image.
///
/// ```rust
/// use gcp_snippets_vision::annotate::{AnnotateImageRequest, Feature, FeatureType, Image};
///
/// let request = AnnotateImageRequest::builder()
///     .image(Image::gcs("gs://bucket/face.jpg"))
///     .feature(Feature::new(FeatureType::FaceDetection))
///     .build()
///     .expect("valid request");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AnnotateImageRequest {
    image: Image,
    features: Vec<Feature>,
}

impl AnnotateImageRequest {
    /// Creates a new builder for an annotation request.
    pub fn builder() -> AnnotateImageRequestBuilder {
        AnnotateImageRequestBuilder::default()
    }

    /// Returns the image of this request.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Returns the requested features.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Comma-separated feature names, used for tracing.
    pub(crate) fn features_label(&self) -> String {
        self.features
            .iter()
            .filter_map(|f| serde_json::to_value(f.feature_type).ok())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Builder for [`AnnotateImageRequest`].
#[derive(Debug, Default)]
pub struct AnnotateImageRequestBuilder {
    image: Option<Image>,
    features: Vec<Feature>,
}

impl AnnotateImageRequestBuilder {
    /// Sets the image to annotate (required).
    pub fn image(mut self, image: Image) -> Self {
        self.image = Some(image);
        self
    }

    /// Adds a feature to extract (at least one is required).
    pub fn feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Builds the request, validating all required fields.
    ///
    /// # Errors
    ///
    /// Returns [`GcpError::Builder`] if:
    /// - `image` is missing, has empty content, or a malformed source
    /// - no feature was added
    /// - a feature asks for zero results
    pub fn build(self) -> GcpResult<AnnotateImageRequest> {
        let image = self
            .image
            .ok_or_else(|| GcpError::Builder("image is required".into()))?;
        image.validate()?;

        if self.features.is_empty() {
            return Err(GcpError::Builder(
                "features is required (at least one)".into(),
            ));
        }
        if self.features.iter().any(|f| f.max_results == Some(0)) {
            return Err(GcpError::Builder("max results must be positive".into()));
        }

        Ok(AnnotateImageRequest {
            image,
            features: self.features,
        })
    }
}

#[derive(Serialize)]
struct BatchAnnotateImagesRequest<'a> {
    requests: &'a [AnnotateImageRequest],
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Responses to a batch annotation call, in request order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatchAnnotateImagesResponse {
    pub responses: Vec<AnnotateImageResponse>,
}

/// Result for a single image: annotations or an error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    /// Detected faces, if face detection was requested.
    pub face_annotations: Vec<FaceAnnotation>,
    /// Detected labels, if label detection was requested.
    pub label_annotations: Vec<EntityAnnotation>,
    /// Set when this image could not be processed.
    pub error: Option<Status>,
}

impl AnnotateImageResponse {
    /// Whether this image failed; sibling images are unaffected.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A face landmark (eye, nose tip, ...).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Landmark {
    #[serde(rename = "type")]
    pub landmark_type: String,
    pub position: Position,
}

/// A detected face with its attributes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaceAnnotation {
    /// Polygon around the whole head.
    pub bounding_poly: BoundingPoly,
    /// Tighter polygon around the skin area of the face.
    pub fd_bounding_poly: BoundingPoly,
    pub landmarks: Vec<Landmark>,
    pub roll_angle: f32,
    pub pan_angle: f32,
    pub tilt_angle: f32,
    pub detection_confidence: f32,
    pub landmarking_confidence: f32,
    pub joy_likelihood: Likelihood,
    pub sorrow_likelihood: Likelihood,
    pub anger_likelihood: Likelihood,
    pub surprise_likelihood: Likelihood,
    pub under_exposed_likelihood: Likelihood,
    pub blurred_likelihood: Likelihood,
    pub headwear_likelihood: Likelihood,
}

/// A detected entity such as a label.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntityAnnotation {
    /// Knowledge Graph entity id.
    pub mid: String,
    pub description: String,
    pub score: f32,
    pub topicality: f32,
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// Annotate a batch of images synchronously.
///
/// Per-image failures are reported in [`AnnotateImageResponse::error`] and do
/// not fail the call; call-level failures (transport, auth, invalid request)
/// are returned as `Err`.
///
/// # Errors
///
/// Returns [`GcpError::Builder`] if `requests` is empty or holds more than
/// [`MAX_IMAGES_PER_REQUEST`] images.
///
/// # Tracing
///
/// Emits a span named `gcp::vision::batch_annotate_images` with fields `images` and `features`.
#[tracing::instrument(
    name = "gcp::vision::batch_annotate_images",
    skip(client, requests),
    fields(
        images = requests.len(),
        features = %requests.first().map(|r| r.features_label()).unwrap_or_default()
    )
)]
pub async fn batch_annotate_images(
    client: &GcpClient,
    requests: &[AnnotateImageRequest],
) -> GcpResult<BatchAnnotateImagesResponse> {
    if requests.is_empty() {
        return Err(GcpError::Builder("at least one image request is required".into()));
    }
    if requests.len() > MAX_IMAGES_PER_REQUEST {
        return Err(GcpError::Builder(format!(
            "at most {MAX_IMAGES_PER_REQUEST} images per request, got {}",
            requests.len()
        )));
    }

    tracing::debug!("annotating images");

    let body = BatchAnnotateImagesRequest { requests };
    let response = client.post(ANNOTATE_PATH, &body).await?;
    let result = response.json::<BatchAnnotateImagesResponse>().await?;

    tracing::debug!(
        responses = result.responses.len(),
        failed = result.responses.iter().filter(|r| r.has_error()).count(),
        "image annotation complete"
    );
    Ok(result)
}
