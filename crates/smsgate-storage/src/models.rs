// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Column codecs between SQLite rows and the domain types in `smsgate-core`.
//!
//! Timestamps are stored as fixed-width UTC text, JSON-valued fields as
//! serialized text, and enums by their wire names.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use smsgate_core::types::format_timestamp;

fn conversion_err<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

pub(crate) fn ts(value: &DateTime<Utc>) -> String {
    format_timestamp(value)
}

pub(crate) fn opt_ts(value: Option<&DateTime<Utc>>) -> Option<String> {
    value.map(format_timestamp)
}

pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, Type::Text, e))
}

pub(crate) fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_err(idx, Type::Text, e))
    })
    .transpose()
}

pub(crate) fn get_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, Type::Text, e))
}

pub(crate) fn get_opt_json<T: DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| serde_json::from_str(&raw).map_err(|e| conversion_err(idx, Type::Text, e)))
        .transpose()
}

pub(crate) fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, Type::Text, e))
}

/// Serialize a value that is known to be JSON-representable.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub(crate) fn to_opt_json<T: serde::Serialize>(value: Option<&T>) -> rusqlite::Result<Option<String>> {
    value.map(to_json).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_text_is_sortable() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        assert!(ts(&early) < ts(&late));
        assert_eq!(opt_ts(None), None);
    }

    #[test]
    fn row_codecs_round_trip_through_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 5, 6, 7, 8, 9).unwrap();
        let vars = serde_json::json!({"CODE": "111"});
        let (got_ts, got_none, got_json, got_status): (
            DateTime<Utc>,
            Option<DateTime<Utc>>,
            serde_json::Value,
            smsgate_core::MessageStatus,
        ) = conn
            .query_row(
                "SELECT ?1, NULL, ?2, 'SENDING'",
                rusqlite::params![ts(&at), to_json(&vars).unwrap()],
                |row| {
                    Ok((
                        get_ts(row, 0)?,
                        get_opt_ts(row, 1)?,
                        get_json(row, 2)?,
                        get_enum(row, 3)?,
                    ))
                },
            )
            .unwrap();
        assert_eq!(got_ts, at);
        assert!(got_none.is_none());
        assert_eq!(got_json, vars);
        assert_eq!(got_status, smsgate_core::MessageStatus::Sending);
    }

    #[test]
    fn bad_enum_text_is_a_conversion_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let result: rusqlite::Result<smsgate_core::MessageStatus> =
            conn.query_row("SELECT 'LOST'", [], |row| get_enum(row, 0));
        assert!(matches!(
            result,
            Err(rusqlite::Error::FromSqlConversionFailure(0, Type::Text, _))
        ));
    }
}
