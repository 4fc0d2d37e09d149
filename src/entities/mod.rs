//! Entity module - Contains the record types owned by the schedule manager.
//! Students and teachers share the validated [`PersonName`]; courses, attendance
//! and payment records are plain serde structs matching the persisted JSON layout.

pub mod attendance;
pub mod course;
pub mod named;
pub mod payment;
pub mod student;
pub mod teacher;

pub use attendance::AttendanceRecord;
pub use course::Course;
pub use named::{NamedEntity, PersonName, validate_name};
pub use payment::{PaymentRecord, check_amount, parse_amount};
pub use student::Student;
pub use teacher::Teacher;

/// Anything with a stable integer identity.
pub trait Identified {
    /// The entity's ID as allocated by the schedule manager.
    fn id(&self) -> i64;
}

/// Appends `id` unless it is already present. Returns whether the list changed.
pub(crate) fn push_unique(ids: &mut Vec<i64>, id: i64) -> bool {
    if ids.contains(&id) {
        return false;
    }
    ids.push(id);
    true
}

/// Removes every occurrence of `id`. Returns whether the list changed.
pub(crate) fn remove_id(ids: &mut Vec<i64>, id: i64) -> bool {
    let before = ids.len();
    ids.retain(|&existing| existing != id);
    ids.len() != before
}

/// Drops repeated IDs while keeping first-seen order.
pub(crate) fn dedup_ids(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut out = Vec::new();
    for id in ids {
        push_unique(&mut out, id);
    }
    out
}

/// Lenient ID deserialisers. Older data files wrote IDs either as numbers or
/// as digit strings; both normalise to `i64`.
pub(crate) mod ids {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    impl RawId {
        fn into_id<E: serde::de::Error>(self) -> Result<i64, E> {
            match self {
                Self::Int(id) => Ok(id),
                Self::Text(text) => text
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("invalid id: {text:?}"))),
            }
        }
    }

    pub fn one<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        RawId::deserialize(deserializer)?.into_id()
    }

    pub fn optional<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        match Option::<RawId>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawId::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(raw) => raw.into_id().map(Some),
        }
    }

    pub fn list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i64>, D::Error> {
        let raw = Option::<Vec<RawId>>::deserialize(deserializer)?.unwrap_or_default();
        let parsed = raw
            .into_iter()
            .map(RawId::into_id)
            .collect::<Result<Vec<i64>, D::Error>>()?;
        Ok(super::dedup_ids(parsed))
    }
}

/// Timestamp (de)serialisation shared by every record type.
///
/// Writes ISO-8601 without offset; reads that or the space-separated
/// `%Y-%m-%d %H:%M:%S` form older files used.
pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
    const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

    /// Formats a timestamp the way it is persisted and exported.
    #[must_use]
    pub fn format(value: &NaiveDateTime) -> String {
        value.format(ISO_FORMAT).to_string()
    }

    /// Parses either accepted timestamp form.
    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        NaiveDateTime::parse_from_str(raw, ISO_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, LEGACY_FORMAT))
            .ok()
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw:?}")))
    }

    /// Same format for fields that may be missing from older files.
    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    super::parse(&raw).ok_or_else(|| {
                        serde::de::Error::custom(format!("invalid timestamp: {raw:?}"))
                    })
                })
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "ids::one")]
        id: i64,
        #[serde(default, deserialize_with = "ids::optional")]
        other: Option<i64>,
        #[serde(default, deserialize_with = "ids::list")]
        list: Vec<i64>,
    }

    #[test]
    fn test_ids_accept_numbers_and_digit_strings() {
        let probe: Probe =
            serde_json::from_str(r#"{"id": "7", "other": 3, "list": [1, "2", 2, 1]}"#).unwrap();
        assert_eq!(probe.id, 7);
        assert_eq!(probe.other, Some(3));
        assert_eq!(probe.list, vec![1, 2]);
    }

    #[test]
    fn test_ids_reject_non_numeric_text() {
        let result = serde_json::from_str::<Probe>(r#"{"id": "seven"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_optional_id_null_and_empty() {
        let probe: Probe = serde_json::from_str(r#"{"id": 1, "other": null}"#).unwrap();
        assert_eq!(probe.other, None);
        let probe: Probe = serde_json::from_str(r#"{"id": 1, "other": ""}"#).unwrap();
        assert_eq!(probe.other, None);
    }

    #[test]
    fn test_timestamp_parses_both_forms() {
        let iso = timestamp::parse("2025-03-01T09:30:00.250").unwrap();
        let legacy = timestamp::parse("2025-03-01 09:30:00").unwrap();
        assert_eq!(timestamp::format(&legacy), "2025-03-01T09:30:00");
        assert!(iso > legacy);
        assert!(timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn test_push_unique_and_remove_id() {
        let mut ids = vec![1, 2];
        assert!(!push_unique(&mut ids, 2));
        assert!(push_unique(&mut ids, 3));
        assert!(remove_id(&mut ids, 1));
        assert!(!remove_id(&mut ids, 1));
        assert_eq!(ids, vec![2, 3]);
    }
}
