use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{nullable, nullable_elements, Name};

/// A named collection of text documents uploaded for concept detection.
///
/// `name` is the natural key. Re-posting a dataset with an existing name
/// replaces the stored one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub uploaded_at: DateTime<Utc>,
    pub name: Name,
    pub size: i64,
    #[serde(deserialize_with = "nullable_elements")]
    pub documents: Vec<Document>,
    #[serde(deserialize_with = "nullable")]
    pub ground_truth: Vec<TruthElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub number: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthElement {
    pub id: String,
    pub value: String,
}

impl Dataset {
    /// The zero-valued dataset answered for unknown names.
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// Payload of the ground truth patch endpoint: a dataset name plus the new
/// ground truth. Any other dataset fields in the body are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroundTruthPatch {
    pub name: Name,
    #[serde(deserialize_with = "nullable")]
    pub ground_truth: Vec<TruthElement>,
}
