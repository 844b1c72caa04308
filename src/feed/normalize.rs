//! Provider records → canonical [`Match`].
//!
//! Each provider contributes one raw input type and one mapping function.
//! The variant is chosen by whichever client produced the record, never by
//! inspecting the payload shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::api_football::{self, ApiFootballFixture};
use crate::db::models::Match;
use crate::error::SyncResult;

/// A single fixture as delivered by one upstream provider.
#[derive(Debug, Clone)]
pub enum RawRecord {
    ApiFootball(ApiFootballFixture),
}

/// Map a provider record to the canonical match.
///
/// Missing nested fields become `None`. The only rejection is a record with
/// no usable external id, reported as [`crate::error::SyncError::InvalidRecord`].
pub fn normalize(raw: &RawRecord) -> SyncResult<Match> {
    match raw {
        RawRecord::ApiFootball(fixture) => api_football::normalize(fixture),
    }
}

// ── Lenient field helpers shared by provider payload types ────────────────────

/// Deserialize a field, turning any type mismatch into `None` instead of
/// failing the whole record.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Canonical string form of an identifier delivered as a number or a string.
pub(crate) fn canonical_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                // 101.0 → "101"; genuine fractions are not identifiers
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| format!("{}", f as i64))
            }
        }
        _ => None,
    }
}

/// Score as reported: `null` stays `None`, `0` stays `Some(0)`.
pub(crate) fn score(value: Option<&Value>) -> Option<i32> {
    match value? {
        Value::Number(n) => match n.as_i64() {
            Some(v) => i32::try_from(v).ok(),
            // 2.0 → 2, matching how identifiers are read
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && (i32::MIN as f64..=i32::MAX as f64).contains(f))
                .map(|f| f as i32),
        },
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
