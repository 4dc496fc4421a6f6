use itertools::Itertools;
use thiserror::Error;

use crate::model::{
    is_zero_time, Agreement, Annotation, Code, CodeIndex, Dataset, DetectionResult, DocWrapper,
    RelationshipNames, Token, ToreRelationship,
};

/// A payload that fails the write-time checks. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{entity}: missing required field '{field}'")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("dataset {dataset}: document {position} has no text")]
    EmptyDocumentText { dataset: String, position: usize },

    #[error("{entity} {name}: {what} {index} points outside of {target} (len {len})")]
    IndexOutOfRange {
        entity: &'static str,
        name: String,
        what: &'static str,
        index: usize,
        target: &'static str,
        len: usize,
    },

    #[error("{entity} {name}: doc '{doc}' spans {begin}..{end} over {len} tokens")]
    InvalidDocSpan {
        entity: &'static str,
        name: String,
        doc: String,
        begin: usize,
        end: usize,
        len: usize,
    },

    #[error("agreement {name}: kappa '{kappa_name}' listed more than once")]
    DuplicateKappa { name: String, kappa_name: String },

    #[error("{names} relationship names but {owners} owners")]
    LengthMismatch { names: usize, owners: usize },
}

pub type ValidationResult = Result<(), ValidationError>;

fn require(present: bool, entity: &'static str, field: &'static str) -> ValidationResult {
    if present {
        Ok(())
    } else {
        Err(ValidationError::MissingField { entity, field })
    }
}

/// Checks the dataset fields required to store it. The first document with
/// empty text aborts the check.
pub fn validate_dataset(dataset: &Dataset) -> ValidationResult {
    require(!dataset.name.is_empty(), "dataset", "name")?;
    require(!is_zero_time(&dataset.uploaded_at), "dataset", "uploaded_at")?;

    if let Some(position) = dataset.documents.iter().position(|d| d.text.is_empty()) {
        return Err(ValidationError::EmptyDocumentText {
            dataset: dataset.name.clone(),
            position,
        });
    }
    Ok(())
}

pub fn validate_result(result: &DetectionResult) -> ValidationResult {
    require(!result.method.is_empty(), "result", "method")?;
    require(!result.status.is_empty(), "result", "status")?;
    require(!is_zero_time(&result.started_at), "result", "started_at")?;
    require(!result.dataset_name.is_empty(), "result", "dataset_name")
}

/// Required fields plus every position reference inside the annotation.
pub fn validate_annotation(annotation: &Annotation) -> ValidationResult {
    require(!annotation.name.is_empty(), "annotation", "name")?;
    require(!annotation.dataset.is_empty(), "annotation", "dataset")?;
    require(!is_zero_time(&annotation.uploaded_at), "annotation", "uploaded_at")?;

    let arena = Arena {
        entity: "annotation",
        name: &annotation.name,
        tokens: &annotation.tokens,
        relationships: &annotation.tore_relationships,
    };
    arena.check_docs(&annotation.docs)?;
    for code in &annotation.codes {
        arena.check_code(code)?;
    }
    let codes = &annotation.codes;
    for relationship in &annotation.tore_relationships {
        arena.check_relationship(
            relationship,
            |entity| entity.resolve(codes).is_some(),
            codes.len(),
        )?;
    }
    Ok(())
}

/// Required fields, position references and kappa name uniqueness.
///
/// Relationship sources in an agreement refer to the `index` carried by a
/// code alternative, not to a position in `code_alternatives`.
pub fn validate_agreement(agreement: &Agreement) -> ValidationResult {
    require(!agreement.name.is_empty(), "agreement", "name")?;
    require(!agreement.dataset.is_empty(), "agreement", "dataset")?;
    require(!is_zero_time(&agreement.created_at), "agreement", "created_at")?;

    let arena = Arena {
        entity: "agreement",
        name: &agreement.name,
        tokens: &agreement.tokens,
        relationships: &agreement.tore_relationships,
    };
    arena.check_docs(&agreement.docs)?;
    for alternative in &agreement.code_alternatives {
        arena.check_code(&alternative.code)?;
    }

    let known_codes: Vec<usize> = agreement
        .code_alternatives
        .iter()
        .map(|a| a.index)
        .unique()
        .collect();
    for relationship in &agreement.tore_relationships {
        arena.check_relationship(
            relationship,
            |entity| known_codes.contains(&entity.0),
            known_codes.len(),
        )?;
    }

    if let Some(kappa_name) = agreement
        .agreement_statistics
        .iter()
        .map(|s| s.kappa_name.as_str())
        .duplicates()
        .next()
    {
        return Err(ValidationError::DuplicateKappa {
            name: agreement.name.clone(),
            kappa_name: kappa_name.to_string(),
        });
    }
    Ok(())
}

pub fn validate_relationship_names(names: &RelationshipNames) -> ValidationResult {
    if names.relationship_names.len() != names.owners.len() {
        return Err(ValidationError::LengthMismatch {
            names: names.relationship_names.len(),
            owners: names.owners.len(),
        });
    }
    Ok(())
}

/// The sequences that positions inside one aggregate may point into.
struct Arena<'a> {
    entity: &'static str,
    name: &'a str,
    tokens: &'a [Token],
    relationships: &'a [ToreRelationship],
}

impl Arena<'_> {
    fn out_of_range(
        &self,
        what: &'static str,
        index: usize,
        target: &'static str,
        len: usize,
    ) -> ValidationError {
        ValidationError::IndexOutOfRange {
            entity: self.entity,
            name: self.name.to_string(),
            what,
            index,
            target,
            len,
        }
    }

    fn check_docs(&self, docs: &[DocWrapper]) -> ValidationResult {
        for doc in docs {
            if doc.begin_index > doc.end_index || doc.end_index > self.tokens.len() {
                return Err(ValidationError::InvalidDocSpan {
                    entity: self.entity,
                    name: self.name.to_string(),
                    doc: doc.name.clone(),
                    begin: doc.begin_index,
                    end: doc.end_index,
                    len: self.tokens.len(),
                });
            }
        }
        Ok(())
    }

    fn check_code(&self, code: &Code) -> ValidationResult {
        if let Some(token) = code.tokens.iter().find(|t| t.resolve(self.tokens).is_none()) {
            return Err(self.out_of_range("code token", token.0, "tokens", self.tokens.len()));
        }
        if let Some(membership) = code
            .relationship_memberships
            .iter()
            .find(|r| r.resolve(self.relationships).is_none())
        {
            return Err(self.out_of_range(
                "relationship membership",
                membership.0,
                "tore_relationships",
                self.relationships.len(),
            ));
        }
        Ok(())
    }

    fn check_relationship(
        &self,
        relationship: &ToreRelationship,
        code_exists: impl Fn(CodeIndex) -> bool,
        codes: usize,
    ) -> ValidationResult {
        if !code_exists(relationship.tore_entity) {
            return Err(self.out_of_range(
                "tore_entity",
                relationship.tore_entity.0,
                "codes",
                codes,
            ));
        }
        if let Some(token) = relationship
            .target_tokens
            .iter()
            .find(|t| t.resolve(self.tokens).is_none())
        {
            return Err(self.out_of_range("target token", token.0, "tokens", self.tokens.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AgreementStatistics, CodeAlternatives, Document, RelationshipIndex, TokenIndex,
    };
    use chrono::{TimeZone, Utc};

    fn tokens(n: usize) -> Vec<Token> {
        (0..n)
            .map(|index| Token {
                index,
                name: format!("t{index}"),
                ..Default::default()
            })
            .collect()
    }

    fn annotation() -> Annotation {
        Annotation {
            name: "a1".to_string(),
            dataset: "d1".to_string(),
            uploaded_at: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap(),
            docs: vec![DocWrapper {
                name: "doc-1".to_string(),
                begin_index: 0,
                end_index: 3,
            }],
            tokens: tokens(3),
            codes: vec![Code {
                index: 0,
                name: "app".to_string(),
                tore: "Software".to_string(),
                tokens: [TokenIndex(2)].into_iter().collect(),
                relationship_memberships: [RelationshipIndex(0)].into_iter().collect(),
            }],
            tore_relationships: vec![ToreRelationship {
                index: 0,
                tore_entity: CodeIndex(0),
                target_tokens: [TokenIndex(0), TokenIndex(1)].into_iter().collect(),
                relationship_name: "uses".to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn dataset_requires_name_date_and_text() {
        let mut dataset = Dataset {
            name: "d1".to_string(),
            uploaded_at: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap(),
            documents: vec![
                Document {
                    id: "1".to_string(),
                    text: "fine".to_string(),
                    number: 1,
                },
                Document {
                    id: "2".to_string(),
                    text: String::new(),
                    number: 2,
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            validate_dataset(&dataset),
            Err(ValidationError::EmptyDocumentText {
                dataset: "d1".to_string(),
                position: 1
            })
        );

        dataset.documents.pop();
        assert!(validate_dataset(&dataset).is_ok());

        dataset.uploaded_at = Default::default();
        assert!(matches!(
            validate_dataset(&dataset),
            Err(ValidationError::MissingField {
                field: "uploaded_at",
                ..
            })
        ));
    }

    #[test]
    fn result_requires_every_key_field() {
        let result = DetectionResult {
            method: "lda".to_string(),
            status: "started".to_string(),
            started_at: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap(),
            dataset_name: String::new(),
            ..Default::default()
        };
        assert_eq!(
            validate_result(&result),
            Err(ValidationError::MissingField {
                entity: "result",
                field: "dataset_name"
            })
        );
    }

    #[test]
    fn consistent_annotation_passes() {
        assert!(validate_annotation(&annotation()).is_ok());
    }

    #[test]
    fn dangling_references_are_rejected() {
        let mut bad_token = annotation();
        bad_token.codes[0].tokens.insert(TokenIndex(3));
        assert!(matches!(
            validate_annotation(&bad_token),
            Err(ValidationError::IndexOutOfRange {
                what: "code token",
                index: 3,
                ..
            })
        ));

        let mut bad_entity = annotation();
        bad_entity.tore_relationships[0].tore_entity = CodeIndex(1);
        assert!(matches!(
            validate_annotation(&bad_entity),
            Err(ValidationError::IndexOutOfRange {
                what: "tore_entity",
                ..
            })
        ));

        let mut bad_membership = annotation();
        bad_membership.codes[0]
            .relationship_memberships
            .insert(RelationshipIndex(4));
        assert!(validate_annotation(&bad_membership).is_err());

        let mut bad_span = annotation();
        bad_span.docs[0].end_index = 4;
        assert!(matches!(
            validate_annotation(&bad_span),
            Err(ValidationError::InvalidDocSpan { .. })
        ));
    }

    #[test]
    fn agreement_sources_resolve_through_alternative_indices() {
        let source = annotation();
        let mut agreement = Agreement {
            name: "ag".to_string(),
            dataset: "d1".to_string(),
            created_at: Utc.with_ymd_and_hms(2021, 6, 2, 0, 0, 0).unwrap(),
            tokens: source.tokens.clone(),
            tore_relationships: vec![ToreRelationship {
                tore_entity: CodeIndex(7),
                ..source.tore_relationships[0].clone()
            }],
            code_alternatives: vec![CodeAlternatives {
                annotation_name: "a1".to_string(),
                index: 7,
                code: source.codes[0].clone(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(validate_agreement(&agreement).is_ok());

        agreement.tore_relationships[0].tore_entity = CodeIndex(0);
        assert!(validate_agreement(&agreement).is_err());
    }

    #[test]
    fn kappa_names_must_be_unique() {
        let agreement = Agreement {
            name: "ag".to_string(),
            dataset: "d1".to_string(),
            created_at: Utc.with_ymd_and_hms(2021, 6, 2, 0, 0, 0).unwrap(),
            agreement_statistics: vec![
                AgreementStatistics {
                    kappa_name: "fleiss".to_string(),
                    ..Default::default()
                },
                AgreementStatistics {
                    kappa_name: "fleiss".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            validate_agreement(&agreement),
            Err(ValidationError::DuplicateKappa {
                name: "ag".to_string(),
                kappa_name: "fleiss".to_string()
            })
        );
    }

    #[test]
    fn relationship_names_need_one_owner_each() {
        let names = RelationshipNames {
            relationship_names: vec!["uses".to_string(), "part of".to_string()],
            owners: vec!["Software".to_string()],
        };
        assert_eq!(
            validate_relationship_names(&names),
            Err(ValidationError::LengthMismatch { names: 2, owners: 1 })
        );
    }
}
