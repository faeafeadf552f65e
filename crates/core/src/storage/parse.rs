//! SQLite column decoding
//!
//! Uuids and timestamps are persisted as text; these helpers decode them and
//! report failures as conversion errors carrying the column index.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::models::AccessLevel;

fn conversion_error<E>(idx: usize, e: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Decode a uuid stored as text
pub fn uuid_text(idx: usize, value: String) -> Result<Uuid, SqlError> {
    Uuid::parse_str(&value).map_err(|e| conversion_error(idx, e))
}

/// Decode a nullable uuid column
pub fn uuid_text_opt(idx: usize, value: Option<String>) -> Result<Option<Uuid>, SqlError> {
    value.map(|v| uuid_text(idx, v)).transpose()
}

/// Decode an RFC3339 timestamp stored as text
pub fn timestamp_text(idx: usize, value: String) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// Decode a nullable timestamp column
pub fn timestamp_text_opt(
    idx: usize,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, SqlError> {
    value.map(|v| timestamp_text(idx, v)).transpose()
}

/// Decode the stored access level; unknown values fall back to Public
pub fn access_level(value: u8) -> AccessLevel {
    match value {
        2 => AccessLevel::Vip,
        1 => AccessLevel::Members,
        _ => AccessLevel::Public,
    }
}
