//! Shared types for Cloud Vision responses.
//!
//! Geometry, likelihood, and status types used by several annotation kinds.

use serde::Deserialize;
use std::fmt;

/// API path of the synchronous batch annotation method.
pub(crate) const ANNOTATE_PATH: &str = "/v1/images:annotate";

/// Maximum number of images accepted by one `images:annotate` call.
pub const MAX_IMAGES_PER_REQUEST: usize = 16;

/// A vertex in pixel coordinates.
///
/// The service omits coordinates equal to zero, so both default to `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
}

/// A bounding polygon around a detected element.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoundingPoly {
    /// Vertices in pixel coordinates.
    pub vertices: Vec<Vertex>,
}

impl fmt::Display for BoundingPoly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.vertices.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({}, {})", v.x, v.y)?;
        }
        write!(f, "]")
    }
}

/// A 3D position in image space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Bucketized likelihood of a face attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    #[default]
    Unknown,
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

impl Likelihood {
    /// Returns the API string representation of this likelihood.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::VeryUnlikely => "VERY_UNLIKELY",
            Self::Unlikely => "UNLIKELY",
            Self::Possible => "POSSIBLE",
            Self::Likely => "LIKELY",
            Self::VeryLikely => "VERY_LIKELY",
        }
    }
}

impl fmt::Display for Likelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-image error returned inside a successful batch response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Status {
    /// gRPC status code.
    pub code: i32,
    /// Developer-facing error message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_defaults_missing_coordinates_to_zero() {
        let poly: BoundingPoly =
            serde_json::from_str(r#"{"vertices": [{}, {"x": 10}, {"y": 20}, {"x": 10, "y": 20}]}"#)
                .unwrap();
        assert_eq!(poly.vertices[0], Vertex { x: 0, y: 0 });
        assert_eq!(poly.vertices[1], Vertex { x: 10, y: 0 });
        assert_eq!(poly.vertices[2], Vertex { x: 0, y: 20 });
    }

    #[test]
    fn bounding_poly_display() {
        let poly = BoundingPoly {
            vertices: vec![Vertex { x: 1, y: 2 }, Vertex { x: 3, y: 4 }],
        };
        assert_eq!(poly.to_string(), "[(1, 2), (3, 4)]");
        assert_eq!(BoundingPoly::default().to_string(), "[]");
    }

    #[test]
    fn likelihood_as_str_matches_serde() {
        let variants = [
            (Likelihood::Unknown, "UNKNOWN"),
            (Likelihood::VeryUnlikely, "VERY_UNLIKELY"),
            (Likelihood::Unlikely, "UNLIKELY"),
            (Likelihood::Possible, "POSSIBLE"),
            (Likelihood::Likely, "LIKELY"),
            (Likelihood::VeryLikely, "VERY_LIKELY"),
        ];

        for (variant, expected) in variants {
            assert_eq!(variant.as_str(), expected);
            let parsed: Likelihood =
                serde_json::from_str(&format!("\"{expected}\"")).expect("should parse");
            assert_eq!(parsed, variant);
        }
    }

    #[test]
    fn likelihood_orders_by_confidence() {
        assert!(Likelihood::VeryLikely > Likelihood::Possible);
        assert!(Likelihood::Unlikely < Likelihood::Likely);
    }
}
