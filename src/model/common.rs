use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

pub type Name = String;

/// Position of a token inside the owning annotation or agreement.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenIndex(pub usize);

/// Position of a code inside the owning annotation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CodeIndex(pub usize);

/// Position of a TORE relationship inside the owning annotation or agreement.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RelationshipIndex(pub usize);

impl TokenIndex {
    pub fn resolve<T>(self, arena: &[T]) -> Option<&T> {
        arena.get(self.0)
    }
}

impl CodeIndex {
    pub fn resolve<T>(self, arena: &[T]) -> Option<&T> {
        arena.get(self.0)
    }
}

impl RelationshipIndex {
    pub fn resolve<T>(self, arena: &[T]) -> Option<&T> {
        arena.get(self.0)
    }
}

/// Result of an upsert by natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertOutcome {
    Inserted,
    Replaced,
}

/// Body returned by write and delete endpoints, and by every error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub message: String,
    pub status: bool,
}

impl ResponseMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: true,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: false,
        }
    }
}

/// Entities whose `last_updated` field is owned by the server.
pub trait LastUpdated {
    fn stamp_last_updated(&mut self, now: DateTime<Utc>);
}

/// Decodes an explicit `null` as the empty value.
///
/// Go clients encode nil slices and maps as `null`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Like [`nullable`] for sequences, but also decodes each `null` element as
/// the element's zero value. Positions never shift, so indices into the
/// sequence stay valid.
pub fn nullable_elements<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let elements = Option::<Vec<Option<T>>>::deserialize(deserializer)?;
    Ok(elements
        .into_iter()
        .flatten()
        .map(Option::unwrap_or_default)
        .collect())
}

/// Set counterpart of [`nullable_elements`].
pub fn nullable_set<'de, D, T>(deserializer: D) -> Result<BTreeSet<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Ord + Deserialize<'de>,
{
    Ok(nullable_elements(deserializer)?.into_iter().collect())
}

/// Timestamps at or before the Unix epoch count as "not provided".
///
/// Older clients send either nothing or Go's zero time
/// (`0001-01-01T00:00:00Z`) for unset times. Both land here.
pub fn is_zero_time(ts: &DateTime<Utc>) -> bool {
    ts.timestamp() <= 0
}

/// Truncates a timestamp to the millisecond precision used for natural keys.
pub fn key_time(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

/// Parses an ISO-8601 / RFC 3339 path segment into a key timestamp.
pub fn parse_key_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| key_time(ts.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn zero_time_covers_epoch_and_go_zero_value() {
        assert!(is_zero_time(&DateTime::<Utc>::default()));
        let go_zero: DateTime<Utc> = "0001-01-01T00:00:00Z".parse().unwrap();
        assert!(is_zero_time(&go_zero));
        assert!(!is_zero_time(&Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap()));
    }

    #[test]
    fn key_time_parses_offsets_and_truncates() {
        let parsed = parse_key_time("2021-03-04T07:06:07.123456+02:00").unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap()
                + chrono::Duration::milliseconds(123)
        );
        assert!(parse_key_time("2021-ZZ03-04T07:06:07Z").is_none());
    }

    #[test]
    fn typed_indices_resolve_against_their_arena() {
        let arena = vec!["a", "b"];
        assert_eq!(TokenIndex(1).resolve(&arena), Some(&"b"));
        assert_eq!(TokenIndex(2).resolve(&arena), None);
        assert_eq!(
            serde_json::to_string(&vec![CodeIndex(0), CodeIndex(3)]).unwrap(),
            "[0,3]"
        );
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Holes {
        #[serde(deserialize_with = "nullable_elements")]
        names: Vec<String>,
        #[serde(deserialize_with = "nullable_set")]
        positions: BTreeSet<TokenIndex>,
        #[serde(deserialize_with = "nullable")]
        count: u32,
    }

    #[test]
    fn null_elements_keep_their_position() {
        let holes: Holes =
            serde_json::from_str(r#"{"names": [null, "b"], "positions": [3, null], "count": null}"#)
                .unwrap();
        assert_eq!(holes.names, vec![String::new(), "b".to_string()]);
        assert_eq!(
            holes.positions.into_iter().collect::<Vec<_>>(),
            vec![TokenIndex(0), TokenIndex(3)]
        );
        assert_eq!(holes.count, 0);

        let holes: Holes = serde_json::from_str(r#"{"names": null}"#).unwrap();
        assert!(holes.names.is_empty());
    }
}
