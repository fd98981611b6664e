//! Label data model.
//!
//! A label is one machine-learning annotation attached to a sample field:
//! a whole-sample classification, a detection box, a keypoint set, a
//! polyline, or a full-frame segmentation. Geometry is normalized to [0,1]
//! relative to the sample's pixel dimensions. Labels are immutable once
//! deserialized; a sample update produces new label instances.

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};

/// Tagged union over the supported label families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Label {
    Classification(Classification),
    Detection(Detection),
    Keypoint(Keypoint),
    Polyline(Polyline),
    Segmentation(Segmentation),
}

impl Label {
    /// Stable label identifier.
    pub fn id(&self) -> &str {
        match self {
            Label::Classification(l) => &l.id,
            Label::Detection(l) => &l.id,
            Label::Keypoint(l) => &l.id,
            Label::Polyline(l) => &l.id,
            Label::Segmentation(l) => &l.id,
        }
    }

    /// Class label string, when assigned.
    pub fn label(&self) -> Option<&str> {
        match self {
            Label::Classification(l) => l.label.as_deref(),
            Label::Detection(l) => l.label.as_deref(),
            Label::Keypoint(l) => l.label.as_deref(),
            Label::Polyline(l) => l.label.as_deref(),
            Label::Segmentation(_) => None,
        }
    }

    /// Prediction confidence, when assigned.
    pub fn confidence(&self) -> Option<f64> {
        match self {
            Label::Classification(l) => l.confidence,
            Label::Detection(l) => l.confidence,
            Label::Keypoint(l) => l.confidence,
            Label::Polyline(l) => l.confidence,
            Label::Segmentation(_) => None,
        }
    }
}

/// A whole-sample class assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// An object detection: normalized box plus optional instance mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// `[x, y, w, h]`, normalized to [0,1] relative to image dimensions.
    pub bounding_box: [f64; 4],
    /// Serialized instance mask covering the box, decoded lazily.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<u8>>,
}

impl Detection {
    /// The normalized bounding box as a geometry type.
    pub fn bbox(&self) -> BoundingBox {
        let [x, y, w, h] = self.bounding_box;
        BoundingBox::new(x, y, w, h)
    }
}

/// An ordered set of normalized keypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Normalized coordinate pairs, in skeleton order.
    pub points: Vec<[f64; 2]>,
}

impl Keypoint {
    pub fn point(&self, index: usize) -> Option<Point> {
        self.points.get(index).map(|[x, y]| Point::new(*x, *y))
    }
}

/// One or more normalized point chains, optionally closed and filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Chains of normalized coordinate pairs.
    pub points: Vec<Vec<[f64; 2]>>,
    /// Whether each chain's last vertex connects back to its first.
    #[serde(default)]
    pub closed: bool,
    /// Whether closed chains render with an interior fill.
    #[serde(default)]
    pub filled: bool,
}

/// A full-frame per-pixel label buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    pub id: String,
    /// Serialized mask payload, decoded lazily.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<u8>>,
}
