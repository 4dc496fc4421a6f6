use serde::{Deserialize, Serialize};

use crate::model::nullable;

/// Suggested TORE categories for a code name.
///
/// The table is rebuilt externally from all annotation codes and replaced
/// wholesale on every write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendation {
    pub codename: String,
    #[serde(alias = "torecodes", deserialize_with = "nullable")]
    pub tore_codes: Vec<String>,
}

/// Response of the recommendation lookup endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationTores {
    #[serde(rename = "recommendationTores")]
    pub recommendation_tores: Vec<String>,
}

impl From<Option<Recommendation>> for RecommendationTores {
    fn from(recommendation: Option<Recommendation>) -> Self {
        Self {
            recommendation_tores: recommendation.map(|r| r.tore_codes).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_recommendation_answers_empty_list() {
        let body = serde_json::to_value(RecommendationTores::from(None)).unwrap();
        assert_eq!(body, serde_json::json!({"recommendationTores": []}));
    }
}
