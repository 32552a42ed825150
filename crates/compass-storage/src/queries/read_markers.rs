// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-reader read markers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use compass_core::{CompassError, ConversationKey, ReadMarker, UserId};
use rusqlite::{params, params_from_iter};

use super::{placeholders, ts_from_ms};
use crate::database::{map_tr_err, Database};

/// Record that `reader` has read `key` up to `read_at`.
///
/// The stored marker only ever moves forward; an older `read_at` leaves it
/// unchanged.
pub async fn mark_read(
    db: &Database,
    key: &ConversationKey,
    reader: &UserId,
    read_at: DateTime<Utc>,
) -> Result<(), CompassError> {
    let key = key.as_str().to_string();
    let reader = reader.as_str().to_string();
    let read_at = read_at.timestamp_millis();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO read_markers (conversation_key, reader_id, last_read_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(conversation_key, reader_id) DO UPDATE SET
                     last_read_at = MAX(read_markers.last_read_at, excluded.last_read_at)",
                params![key, reader, read_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Markers of `reader` for `keys`. Conversations never read are absent.
pub async fn markers_for(
    db: &Database,
    reader: &UserId,
    keys: &[ConversationKey],
) -> Result<HashMap<ConversationKey, ReadMarker>, CompassError> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }
    let reader = reader.clone();
    let keys: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT conversation_key, last_read_at FROM read_markers
                 WHERE reader_id = ? AND conversation_key IN ({})",
                placeholders(keys.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let bound = std::iter::once(reader.as_str().to_string()).chain(keys);
            let markers = stmt
                .query_map(params_from_iter(bound), |row| {
                    let key = ConversationKey::from_stored(row.get::<_, String>(0)?);
                    Ok(ReadMarker {
                        conversation_key: key,
                        reader_id: reader.clone(),
                        last_read_at: ts_from_ms(1, row.get(1)?)?,
                    })
                })?
                .map(|m| m.map(|m| (m.conversation_key.clone(), m)))
                .collect::<rusqlite::Result<HashMap<_, _>>>()?;
            Ok(markers)
        })
        .await
        .map_err(map_tr_err)
}
