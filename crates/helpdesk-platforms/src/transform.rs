//! Lenient field types shared by the platform record shapes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::PlatformError;

const SUBJECT_LIMIT: usize = 100;

/// Platform ids arrive as numbers on some endpoints and strings on others.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FlexId {
    Text(String),
    Number(serde_json::Number),
}

impl FlexId {
    pub fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Yes/no flags: JSON booleans or `Y`/`N`/`true`/`false` strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Value")]
pub struct Flag(pub bool);

impl From<Value> for Flag {
    fn from(value: Value) -> Self {
        Flag(match value {
            Value::Bool(b) => b,
            Value::String(s) => matches!(s.as_str(), "Y" | "y" | "true" | "TRUE"),
            Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
            _ => false,
        })
    }
}

pub fn parse_record<T: DeserializeOwned>(record: &Value, what: &str) -> Result<T, PlatformError> {
    serde_json::from_value(record.clone())
        .map_err(|e| PlatformError::Transform(format!("{what}: {e}")))
}

pub fn require_id(id: Option<FlexId>, what: &str) -> Result<String, PlatformError> {
    id.map(FlexId::into_string)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PlatformError::Transform(format!("{what} has no identifier")))
}

/// First non-blank candidate, cut to the subject limit in characters.
pub fn subject_from(candidates: &[Option<&str>], fallback: &str) -> String {
    candidates
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(|s| s.chars().take(SUBJECT_LIMIT).collect())
        .unwrap_or_else(|| fallback.to_string())
}

pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// RFC 3339, or a bare `YYYY-MM-DDTHH:MM:SS` read as UTC.
pub fn parse_platform_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    raw.parse::<DateTime<Utc>>().ok().or_else(|| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(|ndt| ndt.and_utc())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flex_id_accepts_numbers_and_strings() {
        let n: FlexId = serde_json::from_value(serde_json::json!(12345)).unwrap();
        let s: FlexId = serde_json::from_value(serde_json::json!("abc-1")).unwrap();
        assert_eq!(n.into_string(), "12345");
        assert_eq!(s.into_string(), "abc-1");
    }

    #[test]
    fn flags_read_yes_no_strings() {
        let yes: Flag = serde_json::from_value(serde_json::json!("Y")).unwrap();
        let no: Flag = serde_json::from_value(serde_json::json!("N")).unwrap();
        let t: Flag = serde_json::from_value(serde_json::json!(true)).unwrap();
        assert!(yes.0 && t.0 && !no.0);
    }

    #[test]
    fn subject_skips_blank_candidates_and_truncates() {
        let long = "가".repeat(150);
        assert_eq!(subject_from(&[Some("  "), Some(&long)], "fallback").chars().count(), 100);
        assert_eq!(subject_from(&[None, Some("")], "fallback"), "fallback");
        assert_eq!(subject_from(&[Some("Title"), Some("body")], "fallback"), "Title");
    }

    #[test]
    fn platform_times_accept_naive_timestamps() {
        let naive = parse_platform_time(Some("2024-01-15T09:30:00")).unwrap();
        let zoned = parse_platform_time(Some("2024-01-15T18:30:00+09:00")).unwrap();
        assert_eq!(naive, zoned);
        assert!(parse_platform_time(Some("soon")).is_none());
    }
}
