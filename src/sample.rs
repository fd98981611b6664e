//! Sample data model.
//!
//! A sample is one record of the browsed collection: a media file plus an
//! open-ended mapping of field names to label payloads or scalar values.
//! Samples are owned by the external data layer; the engine holds read-only
//! copies and never mutates them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::label::Label;

/// The media family of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaType {
    Image,
    Video,
    PointCloud,
}

/// Pixel dimensions and frame timing of the underlying media.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
}

/// One value of a sample field: a single label, a list of labels, or an
/// opaque scalar the engine carries but does not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Label(Box<Label>),
    Labels(Vec<Label>),
    Scalar(Value),
}

/// A read-only sample record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Stable identifier within the collection.
    pub id: String,
    pub filepath: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub metadata: SampleMetadata,
    /// Field name to label payload or scalar value.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Sample {
    /// Labels stored under `field`, flattening single labels and lists.
    /// Scalar fields yield nothing.
    pub fn labels_for(&self, field: &str) -> Vec<&Label> {
        match self.fields.get(field) {
            Some(FieldValue::Label(label)) => vec![label.as_ref()],
            Some(FieldValue::Labels(labels)) => labels.iter().collect(),
            Some(FieldValue::Scalar(_)) | None => Vec::new(),
        }
    }

    /// Media pixel dimensions, when the metadata carries them.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.metadata.width, self.metadata.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }

    /// Width / height, when dimensions are known and nonzero.
    pub fn aspect_ratio(&self) -> Option<f64> {
        self.dimensions().and_then(|(w, h)| {
            if w == 0 || h == 0 {
                None
            } else {
                Some(f64::from(w) / f64::from(h))
            }
        })
    }
}
