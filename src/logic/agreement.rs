use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::model::{Agreement, AgreementStatistics, Annotation, LastUpdated};

/// An agreement is complete once no code alternative waits for a decision.
pub fn compute_agreement_completion(agreement: &Agreement) -> bool {
    !agreement
        .code_alternatives
        .iter()
        .any(|alternative| alternative.merge_status.is_pending())
}

/// Applies the server-owned fields of an agreement before it is stored.
pub fn prepare_agreement(agreement: &mut Agreement, now: DateTime<Utc>) {
    agreement.is_completed = compute_agreement_completion(agreement);
    agreement.stamp_last_updated(now);
}

pub fn prepare_annotation(annotation: &mut Annotation, now: DateTime<Utc>) {
    annotation.stamp_last_updated(now);
}

/// Merges freshly computed kappa values into the agreement statistics.
///
/// A known kappa keeps its `initial_kappa` and moves `current_kappa`. A new
/// kappa starts with both set to the computed value. Statistics without a
/// fresh value are left as they are.
pub fn apply_kappa_scores(agreement: &mut Agreement, scores: &BTreeMap<String, f64>) {
    for (kappa_name, &value) in scores {
        match agreement
            .agreement_statistics
            .iter_mut()
            .find(|s| &s.kappa_name == kappa_name)
        {
            Some(existing) => existing.current_kappa = value,
            None => agreement.agreement_statistics.push(AgreementStatistics {
                kappa_name: kappa_name.clone(),
                initial_kappa: value,
                current_kappa: value,
            }),
        }
    }
}
