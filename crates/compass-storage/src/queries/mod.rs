// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed queries, one module per table group.

pub mod directory;
pub mod messages;
pub mod pending;
pub mod read_markers;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

/// Epoch milliseconds to a UTC timestamp, as a column conversion.
pub(crate) fn ts_from_ms(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp {ms} out of range").into(),
        )
    })
}

/// Parses a TEXT column into a strum enum.
pub(crate) fn parse_text<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// `?, ?, ?` for an `IN (...)` clause of `n` values.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
