//! Typed sort keys.
//!
//! A rendered key string is parsed according to its declared [`ValueType`].
//! Parsing never fails from the caller's point of view: an unparseable
//! number or time degrades to a string key for that one value.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::metrics::Metrics;

/// Declared type of a sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    String,
    Number,
    Time,
}

impl ValueType {
    pub const ALL: [ValueType; 3] = [ValueType::String, ValueType::Number, ValueType::Time];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Time => "time",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A rendered value failed to parse as its declared type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot parse {raw:?} as {expected}")]
pub struct KeyParseError {
    pub raw: String,
    pub expected: ValueType,
}

/// A comparable sort key value.
///
/// Ordering is total. Values of the same kind compare natively; values of
/// different kinds compare by rank: `Number < Time < String`.
#[derive(Debug, Clone)]
pub enum TypedValue {
    Number(f64),
    Time(DateTime<FixedOffset>),
    String(String),
}

impl TypedValue {
    fn rank(&self) -> u8 {
        match self {
            TypedValue::Number(_) => 0,
            TypedValue::Time(_) => 1,
            TypedValue::String(_) => 2,
        }
    }
}

impl Ord for TypedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TypedValue::Number(a), TypedValue::Number(b)) => a.total_cmp(b),
            (TypedValue::Time(a), TypedValue::Time(b)) => a.cmp(b),
            (TypedValue::String(a), TypedValue::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for TypedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TypedValue {}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

fn local_to_fixed(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    // `earliest` picks the first instant when a DST fold makes the local
    // time ambiguous; a DST gap yields None.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Parse a timestamp. Inputs without an offset are taken as host-local time.
pub fn parse_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt);
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return local_to_fixed(naive);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).and_then(local_to_fixed);
        }
    }
    None
}

/// Strictly parse `raw` as `declared`.
pub fn try_parse_key(raw: &str, declared: ValueType) -> Result<TypedValue, KeyParseError> {
    let failed = || KeyParseError {
        raw: raw.to_string(),
        expected: declared,
    };
    match declared {
        ValueType::String => Ok(TypedValue::String(raw.to_string())),
        ValueType::Number => raw
            .trim()
            .parse::<f64>()
            .map(TypedValue::Number)
            .map_err(|_| failed()),
        ValueType::Time => parse_time(raw).map(TypedValue::Time).ok_or_else(failed),
    }
}

/// Parse `raw` as `declared`, degrading to a string key on failure.
///
/// The failure is logged at `warn`; the caller always gets a value.
pub fn parse_key(raw: &str, declared: ValueType) -> TypedValue {
    parse_key_counted(raw, declared, &crate::metrics::METRICS)
}

pub(crate) fn parse_key_counted(raw: &str, declared: ValueType, metrics: &Metrics) -> TypedValue {
    match try_parse_key(raw, declared) {
        Ok(value) => value,
        Err(err) => {
            crate::obs::emit_key_fallback(&err);
            metrics.inc_key_fallbacks();
            TypedValue::String(raw.to_string())
        }
    }
}
