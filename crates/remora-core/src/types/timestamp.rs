use crate::{traits::FieldValue, value::Value, value::ValueType};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

///
/// TimestampError
///

#[derive(Debug, ThisError)]
#[error("timestamp parse error: '{input}'")]
pub struct TimestampError {
    pub input: String,
}

///
/// Timestamp
/// UTC date-time used for `DateTime` columns.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    #[must_use]
    pub const fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Build from calendar parts; `None` when the parts are out of range.
    #[must_use]
    pub fn from_ymd_hms(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> Option<Self> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(h, m, s)?;
        Some(Self(naive.and_utc()))
    }

    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    #[must_use]
    pub const fn get(&self) -> DateTime<Utc> {
        self.0
    }

    #[must_use]
    pub fn year(&self) -> i64 {
        i64::from(self.0.year())
    }

    #[must_use]
    pub fn month(&self) -> i64 {
        i64::from(self.0.month())
    }

    #[must_use]
    pub fn day(&self) -> i64 {
        i64::from(self.0.day())
    }

    #[must_use]
    pub fn hour(&self) -> i64 {
        i64::from(self.0.hour())
    }

    /// Parse RFC 3339 or the zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` form the
    /// backend emits; zone-less values are taken as UTC.
    pub fn parse_flexible(s: &str) -> Result<Self, TimestampError> {
        let trimmed = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }

        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self(naive.and_utc()));
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            && let Some(naive) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(Self(naive.and_utc()));
        }

        Err(TimestampError {
            input: s.to_string(),
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_flexible(s)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl FieldValue for Timestamp {
    const VALUE_TYPE: ValueType = ValueType::DateTime;

    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::DateTime(v) => Some(*v),
            Value::Text(s) => Self::parse_flexible(s).ok(),
            _ => None,
        }
    }
}
