//! Practice records as served by the data store, and their derived view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::timestamp::parse_timestamp;

/// A raw practice row.
///
/// Field values are free text and may be absent. On deserialization a
/// non-string `name`, `address` or `city` is treated as absent, while `zip`
/// and `id` also accept numbers. Columns not listed here are ignored.
///
/// # Examples
///
/// ```
/// use practice_dedupe::PracticeRecord;
///
/// let record: PracticeRecord =
///     serde_json::from_str(r#"{"name": "Acme Dental", "zip": 60606, "city": null}"#).unwrap();
/// assert_eq!(record.zip.as_deref(), Some("60606"));
/// assert!(record.city.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeRecord {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "text_only")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "text_only")]
    pub address: Option<String>,

    #[serde(default, deserialize_with = "text_only")]
    pub city: Option<String>,

    #[serde(default, deserialize_with = "zip_code")]
    pub zip: Option<String>,

    /// Creation time in the data store; used only for cursoring.
    ///
    /// Naive timestamps are read as UTC. A value that is not a timestamp at
    /// all is treated as absent, so the record is still fetched.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl PracticeRecord {
    /// Creates a record with all four matching fields set.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        city: impl Into<String>,
        zip: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            address: Some(address.into()),
            city: Some(city.into()),
            zip: Some(zip.into().trim().to_string()),
            created_at: None,
        }
    }

    /// Sets the store identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

/// A practice record together with its normalized fields and matching keys.
///
/// Invariants:
/// - `exact_key == name_norm | address_norm | zip_norm`
/// - `loose_key == name_norm | city_norm`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(flatten)]
    pub record: PracticeRecord,

    pub name_norm: String,
    pub address_norm: String,
    pub city_norm: String,
    pub zip_norm: String,

    /// High-confidence dedup key.
    pub exact_key: String,

    /// Lower-confidence grouping key for secondary review.
    pub loose_key: String,
}

fn text_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn zip_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_as_string(deserializer)?.map(|zip| zip.trim().to_string()))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(raw) => {
            let parsed = parse_timestamp(&raw);
            if parsed.is_none() {
                tracing::debug!(created_at = %raw, "unparseable created_at treated as absent");
            }
            parsed
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_non_text_fields_are_absent() {
        let record: PracticeRecord = serde_json::from_str(
            r#"{"name": 42, "address": ["x"], "city": true, "zip": null}"#,
        )
        .unwrap();
        assert!(record.name.is_none());
        assert!(record.address.is_none());
        assert!(record.city.is_none());
        assert!(record.zip.is_none());
    }

    #[test]
    fn test_zip_is_coerced_and_trimmed() {
        let numeric: PracticeRecord = serde_json::from_str(r#"{"zip": 10001}"#).unwrap();
        assert_eq!(numeric.zip.as_deref(), Some("10001"));

        let padded: PracticeRecord = serde_json::from_str(r#"{"zip": "  60606 \n"}"#).unwrap();
        assert_eq!(padded.zip.as_deref(), Some("60606"));
    }

    #[test]
    fn test_missing_fields_and_extra_columns() {
        let record: PracticeRecord =
            serde_json::from_str(r#"{"id": 7, "name": "Acme", "phone": "555-0100"}"#).unwrap();
        assert_eq!(record.id.as_deref(), Some("7"));
        assert_eq!(record.name.as_deref(), Some("Acme"));
        assert!(record.address.is_none());
        assert!(record.created_at.is_none());
    }

    #[test]
    fn test_created_at_parses_rfc3339() {
        let record: PracticeRecord =
            serde_json::from_str(r#"{"created_at": "2024-03-01T08:30:00+00:00"}"#).unwrap();
        assert_eq!(
            record.created_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_created_at_without_offset_is_utc() {
        let record: PracticeRecord =
            serde_json::from_str(r#"{"id": 1, "name": "A", "created_at": "2024-05-01T12:00:00"}"#)
                .unwrap();
        assert_eq!(
            record.created_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );

        let spaced: PracticeRecord =
            serde_json::from_str(r#"{"created_at": "2024-05-01 12:00:00.5"}"#).unwrap();
        assert!(spaced.created_at.is_some());
    }

    #[test]
    fn test_unparseable_created_at_is_absent() {
        for raw in [r#""last tuesday""#, "1714564800", "null", r#"{"at": 1}"#] {
            let json = format!(r#"{{"name": "Acme", "created_at": {raw}}}"#);
            let record: PracticeRecord = serde_json::from_str(&json).unwrap();
            assert!(record.created_at.is_none(), "{raw}");
            assert_eq!(record.name.as_deref(), Some("Acme"));
        }
    }

    #[test]
    fn test_normalized_record_serializes_flat() {
        let normalized = NormalizedRecord {
            record: PracticeRecord::new("Acme", "1 Main St", "Chicago", "60606").with_id("a1"),
            name_norm: "acme".to_string(),
            address_norm: "1 main street".to_string(),
            city_norm: "chicago".to_string(),
            zip_norm: "60606".to_string(),
            exact_key: "acme|1 main street|60606".to_string(),
            loose_key: "acme|chicago".to_string(),
        };
        let json = serde_json::to_value(&normalized).unwrap();
        assert_eq!(json["id"], "a1");
        assert_eq!(json["name"], "Acme");
        assert_eq!(json["exact_key"], "acme|1 main street|60606");

        let back: NormalizedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, normalized);
    }
}
