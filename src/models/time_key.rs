use crate::error::{AppError, AppResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const MIN_KEY: i64 = 10000101;
const MAX_KEY: i64 = 99991231;

/// Calendar key of a forecast date, canonically an integer `YYYYMMDD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeKey(NaiveDate);

impl TimeKey {
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Integer `YYYYMMDD` representation, as stored
    pub fn as_i32(&self) -> i32 {
        self.0.year() * 10000 + self.0.month() as i32 * 100 + self.0.day() as i32
    }

    /// Parse an integer `YYYYMMDD` key
    pub fn from_i64(value: i64) -> AppResult<Self> {
        if !(MIN_KEY..=MAX_KEY).contains(&value) {
            return Err(AppError::InvalidDate(value.to_string()));
        }
        let year = (value / 10000) as i32;
        let month = ((value / 100) % 100) as u32;
        let day = (value % 100) as u32;
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| AppError::InvalidDate(value.to_string()))
    }

    /// Parse `YYYYMMDD` or ISO `YYYY-MM-DD` text
    pub fn parse(input: &str) -> AppResult<Self> {
        let trimmed = input.trim();
        if trimmed.len() == 8 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let value = trimmed
                .parse::<i64>()
                .map_err(|_| AppError::InvalidDate(input.to_string()))?;
            return Self::from_i64(value);
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| AppError::InvalidDate(input.to_string()))
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

impl Serialize for TimeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for TimeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        TimeKey::from_i64(value).map_err(serde::de::Error::custom)
    }
}

/// Date as supplied by a client, before normalization
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimeKeyInput {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl TimeKeyInput {
    pub fn normalize(&self) -> AppResult<TimeKey> {
        match self {
            TimeKeyInput::Number(value) => TimeKey::from_i64(*value),
            TimeKeyInput::Text(text) => TimeKey::parse(text),
            TimeKeyInput::Other(value) => Err(AppError::InvalidDate(value.to_string())),
        }
    }
}

impl From<i64> for TimeKeyInput {
    fn from(value: i64) -> Self {
        TimeKeyInput::Number(value)
    }
}

impl From<&str> for TimeKeyInput {
    fn from(value: &str) -> Self {
        TimeKeyInput::Text(value.to_string())
    }
}
