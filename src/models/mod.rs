//! Core data models for the bucket file-storage service.
//!
//! These entities represent the logical structure of the three metadata
//! documents: the bucket registry, the permission registry, and the per-bucket
//! file index. They serialize naturally as JSON via `serde` and are the only
//! shapes the store ever writes to disk.

pub mod bucket;
pub mod file;
pub mod permission;

/// Serde helpers for registry timestamps.
///
/// New documents are written RFC 3339 UTC. Earlier writers recorded naive
/// local ISO-8601 (no offset); those are accepted on load and read as UTC so
/// a document is never rejected over its timestamp format.
pub(crate) mod flex_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|err| D::Error::custom(format!("invalid timestamp `{raw}`: {err}")))
    }

}
