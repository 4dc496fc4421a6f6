use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{
    nullable, nullable_elements, nullable_set, Code, DocWrapper, LastUpdated, Name, Token,
    ToreRelationship,
};

/// Reconciled annotation state across several annotations of one dataset.
///
/// `is_completed` is derived from `code_alternatives` on every write; whatever
/// a client sends for it is overwritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Agreement {
    #[serde(deserialize_with = "nullable")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "nullable")]
    pub last_updated: DateTime<Utc>,
    #[serde(deserialize_with = "nullable")]
    pub name: Name,
    #[serde(deserialize_with = "nullable")]
    pub dataset: Name,
    #[serde(deserialize_with = "nullable_set")]
    pub annotation_names: BTreeSet<Name>,
    #[serde(deserialize_with = "nullable_elements")]
    pub docs: Vec<DocWrapper>,
    #[serde(deserialize_with = "nullable_elements")]
    pub tokens: Vec<Token>,
    #[serde(deserialize_with = "nullable_elements")]
    pub tore_relationships: Vec<ToreRelationship>,
    #[serde(deserialize_with = "nullable_elements")]
    pub code_alternatives: Vec<CodeAlternatives>,
    #[serde(deserialize_with = "nullable_elements")]
    pub agreement_statistics: Vec<AgreementStatistics>,
    #[serde(deserialize_with = "nullable")]
    pub is_completed: bool,
}

/// One annotator's candidate code, waiting for (or past) a merge decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeAlternatives {
    #[serde(deserialize_with = "nullable")]
    pub annotation_name: Name,
    #[serde(deserialize_with = "nullable")]
    pub index: usize,
    #[serde(deserialize_with = "nullable")]
    pub code: Code,
    #[serde(deserialize_with = "nullable")]
    pub merge_status: MergeStatus,
}

/// Merge decision for a code alternative. Any state may follow any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergeStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgreementStatistics {
    #[serde(deserialize_with = "nullable")]
    pub kappa_name: String,
    #[serde(deserialize_with = "nullable")]
    pub initial_kappa: f64,
    #[serde(deserialize_with = "nullable")]
    pub current_kappa: f64,
}

impl MergeStatus {
    pub fn is_pending(self) -> bool {
        self == MergeStatus::Pending
    }
}

impl Agreement {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn statistic(&self, kappa_name: &str) -> Option<&AgreementStatistics> {
        self.agreement_statistics
            .iter()
            .find(|s| s.kappa_name == kappa_name)
    }
}

impl LastUpdated for Agreement {
    fn stamp_last_updated(&mut self, now: DateTime<Utc>) {
        self.last_updated = now;
    }
}

/// Listing view of an agreement without tokens and alternatives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgreementSummary {
    pub name: Name,
    pub dataset: Name,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub annotation_names: BTreeSet<Name>,
    pub is_completed: bool,
}

impl From<&Agreement> for AgreementSummary {
    fn from(agreement: &Agreement) -> Self {
        Self {
            name: agreement.name.clone(),
            dataset: agreement.dataset.clone(),
            created_at: agreement.created_at,
            last_updated: agreement.last_updated,
            annotation_names: agreement.annotation_names.clone(),
            is_completed: agreement.is_completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_status_uses_capitalised_wire_names() {
        let statuses: Vec<MergeStatus> =
            serde_json::from_str(r#"["Pending", "Accepted", "Declined"]"#).unwrap();
        assert_eq!(
            statuses,
            vec![MergeStatus::Pending, MergeStatus::Accepted, MergeStatus::Declined]
        );
        assert!(serde_json::from_str::<MergeStatus>(r#""pending""#).is_err());
    }

    #[test]
    fn missing_merge_status_defaults_to_pending() {
        let alternative: CodeAlternatives =
            serde_json::from_str(r#"{"annotation_name": "a1", "index": 3}"#).unwrap();
        assert_eq!(alternative.merge_status, MergeStatus::Pending);
    }

    #[test]
    fn null_fields_and_elements_decode_as_zero_values() {
        let agreement: Agreement = serde_json::from_str(
            r#"{"name": "ag", "annotation_names": ["anna", null], "is_completed": null,
                "code_alternatives": [
                    null,
                    {"annotation_name": "anna", "index": null, "merge_status": null, "code": null}
                ],
                "agreement_statistics": [{"kappa_name": "fleiss", "initial_kappa": null}]}"#,
        )
        .unwrap();
        assert_eq!(agreement.code_alternatives.len(), 2);
        assert_eq!(agreement.code_alternatives[0], CodeAlternatives::default());
        let alternative = &agreement.code_alternatives[1];
        assert_eq!(alternative.merge_status, MergeStatus::Pending);
        assert_eq!(alternative.code, Code::default());
        assert_eq!(alternative.index, 0);
        assert!(agreement.annotation_names.contains(""));
        assert!(!agreement.is_completed);
        assert_eq!(agreement.agreement_statistics[0].initial_kappa, 0.0);
    }
}
