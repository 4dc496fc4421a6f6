use serde::{Deserialize, Serialize};

use crate::model::{nullable, nullable_elements};

/// The TORE category list offered by the annotation tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToreTypes {
    #[serde(deserialize_with = "nullable")]
    pub tores: Vec<String>,
}

/// Relationship names offered by the annotation tool, each paired with the
/// TORE category that owns it. Both lists have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipNames {
    #[serde(deserialize_with = "nullable_elements")]
    pub relationship_names: Vec<String>,
    #[serde(deserialize_with = "nullable_elements")]
    pub owners: Vec<String>,
}
