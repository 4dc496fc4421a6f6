use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{key_time, nullable, Name};

pub const STATUS_FINISHED: &str = "finished";
pub const STATUS_FAILED: &str = "failed";

/// Statuses a stored result must have before it may be renamed.
pub const RENAMABLE_STATUSES: &[&str] = &[STATUS_FINISHED, STATUS_FAILED];

/// A concept detection run, keyed by `(method, started_at)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionResult {
    pub method: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub dataset_name: Name,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(deserialize_with = "nullable")]
    pub topics: BTreeMap<String, serde_json::Value>,
    #[serde(deserialize_with = "nullable")]
    pub doc_topic: BTreeMap<String, serde_json::Value>,
    #[serde(deserialize_with = "nullable")]
    pub metrics: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codes: Option<Vec<serde_json::Value>>,
}

/// Compound natural key of a detection result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultKey {
    pub method: String,
    pub started_at: DateTime<Utc>,
}

impl ResultKey {
    pub fn new(method: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            method: method.into(),
            started_at: key_time(started_at),
        }
    }
}

impl DetectionResult {
    pub fn key(&self) -> ResultKey {
        ResultKey::new(self.method.clone(), self.started_at)
    }

    /// Brings `started_at` to key precision so lookups by key round-trip.
    pub fn normalized(mut self) -> Self {
        self.started_at = key_time(self.started_at);
        self
    }

    pub fn is_renamable(&self) -> bool {
        RENAMABLE_STATUSES.contains(&self.status.as_str())
    }
}

/// Body of the rename endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RenameResultRequest {
    pub method: String,
    pub started_at: DateTime<Utc>,
    pub name: String,
}

/// What a guarded rename did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    NotFound,
    /// The stored result exists but its status forbids renaming.
    Conflict { status: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_terminal_statuses_are_renamable() {
        let mut result = DetectionResult {
            status: "running".to_string(),
            ..Default::default()
        };
        assert!(!result.is_renamable());
        result.status = STATUS_FAILED.to_string();
        assert!(result.is_renamable());
        result.status = "Finished".to_string();
        assert!(!result.is_renamable());
    }

    #[test]
    fn open_maps_keep_arbitrary_values() {
        let result: DetectionResult = serde_json::from_str(
            r#"{"method": "lda", "status": "finished", "started_at": "2021-01-01T00:00:00.123456Z",
                "dataset_name": "d", "params": {"k": 5, "alpha": "auto"},
                "metrics": {"coherence": 0.41}}"#,
        )
        .unwrap();
        assert_eq!(result.params["k"], serde_json::json!(5));
        let normalized = result.clone().normalized();
        assert_eq!(normalized.started_at.timestamp_subsec_micros(), 123_000);
        assert_eq!(normalized.key(), result.key());
    }
}
