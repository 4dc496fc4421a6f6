use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{
    nullable, nullable_elements, nullable_set, CodeIndex, LastUpdated, Name, RelationshipIndex,
    TokenIndex,
};

/// One annotator's work on one dataset.
///
/// Tokens, codes and TORE relationships form a small arena: every reference
/// between them is a position into this annotation's own vectors and has no
/// meaning outside of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotation {
    #[serde(deserialize_with = "nullable")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(deserialize_with = "nullable")]
    pub last_updated: DateTime<Utc>,
    #[serde(deserialize_with = "nullable")]
    pub name: Name,
    /// Name of the annotated dataset. Not checked against stored datasets.
    #[serde(deserialize_with = "nullable")]
    pub dataset: Name,
    #[serde(deserialize_with = "nullable_elements")]
    pub docs: Vec<DocWrapper>,
    #[serde(deserialize_with = "nullable_elements")]
    pub tokens: Vec<Token>,
    #[serde(deserialize_with = "nullable_elements")]
    pub codes: Vec<Code>,
    #[serde(deserialize_with = "nullable_elements")]
    pub tore_relationships: Vec<ToreRelationship>,
}

/// Token span of one dataset document inside the flattened token list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocWrapper {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub begin_index: usize,
    #[serde(deserialize_with = "nullable")]
    pub end_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    #[serde(deserialize_with = "nullable")]
    pub index: usize,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub lemma: String,
    #[serde(deserialize_with = "nullable")]
    pub pos: String,
    #[serde(deserialize_with = "nullable")]
    pub num_name_codes: u32,
    #[serde(deserialize_with = "nullable")]
    pub num_tore_codes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Code {
    #[serde(deserialize_with = "nullable")]
    pub index: usize,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    /// TORE category assigned to the code.
    #[serde(deserialize_with = "nullable")]
    pub tore: String,
    #[serde(deserialize_with = "nullable_set")]
    pub tokens: BTreeSet<TokenIndex>,
    #[serde(deserialize_with = "nullable_set")]
    pub relationship_memberships: BTreeSet<RelationshipIndex>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToreRelationship {
    #[serde(deserialize_with = "nullable")]
    pub index: usize,
    #[serde(deserialize_with = "nullable")]
    pub tore_entity: CodeIndex,
    #[serde(deserialize_with = "nullable_set")]
    pub target_tokens: BTreeSet<TokenIndex>,
    #[serde(deserialize_with = "nullable")]
    pub relationship_name: String,
}

impl Annotation {
    pub fn not_found() -> Self {
        Self::default()
    }
}

impl LastUpdated for Annotation {
    fn stamp_last_updated(&mut self, now: DateTime<Utc>) {
        self.last_updated = now;
    }
}

/// Listing view of an annotation without its token arena.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSummary {
    pub name: Name,
    pub dataset: Name,
    pub uploaded_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<&Annotation> for AnnotationSummary {
    fn from(annotation: &Annotation) -> Self {
        Self {
            name: annotation.name.clone(),
            dataset: annotation.dataset.clone(),
            uploaded_at: annotation.uploaded_at,
            last_updated: annotation.last_updated,
        }
    }
}

/// The codes of one annotation, as consumed by the recommendation builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationCodes {
    pub name: Name,
    pub codes: Vec<Code>,
}

impl From<&Annotation> for AnnotationCodes {
    fn from(annotation: &Annotation) -> Self {
        Self {
            name: annotation.name.clone(),
            codes: annotation.codes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_payload_decodes_with_defaults() {
        let annotation: Annotation = serde_json::from_str(
            r#"{"name": "a1", "dataset": "d1", "uploaded_at": "2021-05-01T10:00:00Z",
                "codes": [{"index": 0, "name": "x", "tore": "Task", "tokens": [2, 1, 2]}]}"#,
        )
        .unwrap();
        assert_eq!(annotation.codes[0].tokens.len(), 2);
        assert!(annotation.tore_relationships.is_empty());
    }

    #[test]
    fn null_holes_keep_arena_positions() {
        let annotation: Annotation = serde_json::from_str(
            r#"{"name": "a1", "dataset": null, "tokens": [{"index": 0, "name": null}, null],
                "codes": [null, {"index": 1, "name": "x", "tore": "Task", "tokens": [1, null],
                                 "relationship_memberships": null}],
                "tore_relationships": [null, {"index": 1, "tore_entity": null,
                    "target_tokens": [0], "relationship_name": "uses"}]}"#,
        )
        .unwrap();
        assert_eq!(annotation.dataset, "");
        assert_eq!(annotation.tokens.len(), 2);
        assert_eq!(annotation.tokens[1], Token::default());
        assert_eq!(annotation.codes[0], Code::default());
        assert_eq!(annotation.codes[1].name, "x");
        assert_eq!(
            annotation.codes[1].tokens.iter().copied().collect::<Vec<_>>(),
            vec![TokenIndex(0), TokenIndex(1)]
        );
        assert_eq!(annotation.tore_relationships[0], ToreRelationship::default());
        assert_eq!(annotation.tore_relationships[1].tore_entity, CodeIndex(0));
        assert_eq!(annotation.tore_relationships[1].relationship_name, "uses");
    }
}
