// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-party message operations.

use chrono::Utc;
use compass_core::{ChatMessage, CompassError, ConversationKey, UserId, Viewer};
use rusqlite::{params, params_from_iter, Row};

use super::{parse_text, placeholders, ts_from_ms};
use crate::database::{map_tr_err, Database};

const MESSAGE_COLUMNS: &str = "id, conversation_key, sender_id, sender_role, body, created_at";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role: String = row.get(3)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        conversation_key: ConversationKey::from_stored(row.get::<_, String>(1)?),
        sender_id: UserId::new(row.get::<_, String>(2)?),
        sender_role: parse_text(3, &role)?,
        body: row.get(4)?,
        created_at: ts_from_ms(5, row.get(5)?)?,
    })
}

/// Insert a fully-formed message.
pub async fn insert_message(db: &Database, msg: &ChatMessage) -> Result<(), CompassError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_key, sender_id, sender_role, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    msg.id,
                    msg.conversation_key.as_str(),
                    msg.sender_id.as_str(),
                    msg.sender_role.to_string(),
                    msg.body,
                    msg.created_at.timestamp_millis(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Store a new message from `sender` to `recipient`, stamped by this store.
pub async fn send_message(
    db: &Database,
    sender: &Viewer,
    recipient: &UserId,
    body: &str,
) -> Result<ChatMessage, CompassError> {
    if body.trim().is_empty() {
        return Err(CompassError::InvalidInput(
            "message body must not be empty".to_string(),
        ));
    }
    let msg = ChatMessage {
        id: uuid::Uuid::new_v4().to_string(),
        conversation_key: ConversationKey::new(&sender.user_id, recipient),
        sender_id: sender.user_id.clone(),
        sender_role: sender.role,
        body: body.to_string(),
        created_at: Utc::now(),
    };
    insert_message(db, &msg).await?;
    Ok(msg)
}

/// All messages of the given conversations, oldest first.
pub async fn messages_for(
    db: &Database,
    keys: &[ConversationKey],
) -> Result<Vec<ChatMessage>, CompassError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let keys: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_key IN ({})
                 ORDER BY created_at ASC, id ASC",
                placeholders(keys.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let messages = stmt
                .query_map(params_from_iter(keys.iter()), message_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent `limit` messages of one conversation, oldest first.
pub async fn thread(
    db: &Database,
    key: &ConversationKey,
    limit: Option<i64>,
) -> Result<Vec<ChatMessage>, CompassError> {
    let key = key.as_str().to_string();
    let limit = limit.unwrap_or(-1);
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT * FROM (
                     SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_key = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2
                 ) ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let messages = stmt
                .query_map(params![key, limit], message_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use compass_core::Role;
    use tempfile::tempdir;

    use super::*;

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("msg.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn msg(id: &str, from: &str, to: &str, role: Role, at_ms: i64) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            conversation_key: ConversationKey::new(&UserId::new(from), &UserId::new(to)),
            sender_id: UserId::new(from),
            sender_role: role,
            body: format!("body of {id}"),
            created_at: Utc.timestamp_millis_opt(at_ms).unwrap(),
        }
    }

    #[tokio::test]
    async fn messages_for_filters_by_key_and_orders_by_time() {
        let (db, _dir) = setup().await;
        insert_message(&db, &msg("m2", "c1", "s1", Role::Counselor, 2_000)).await.unwrap();
        insert_message(&db, &msg("m1", "s1", "c1", Role::Student, 1_000)).await.unwrap();
        insert_message(&db, &msg("m3", "c2", "s1", Role::Counselor, 3_000)).await.unwrap();

        let key = ConversationKey::new(&UserId::new("s1"), &UserId::new("c1"));
        let found = messages_for(&db, &[key]).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(found[1].sender_role, Role::Counselor);
        assert_eq!(found[1].created_at.timestamp_millis(), 2_000);
    }

    #[tokio::test]
    async fn messages_for_no_keys_is_empty() {
        let (db, _dir) = setup().await;
        assert!(messages_for(&db, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_message_assigns_id_key_and_time() {
        let (db, _dir) = setup().await;
        let sender = Viewer::new(UserId::new("s1"), Role::Student, None);
        let sent = send_message(&db, &sender, &UserId::new("c1"), "hi").await.unwrap();
        assert_eq!(sent.conversation_key.as_str(), "c1__s1");
        assert!(!sent.id.is_empty());

        let err = send_message(&db, &sender, &UserId::new("c1"), "   ").await;
        assert!(matches!(err, Err(CompassError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn thread_returns_latest_in_ascending_order() {
        let (db, _dir) = setup().await;
        for (i, at) in [1_000, 2_000, 3_000].into_iter().enumerate() {
            insert_message(&db, &msg(&format!("m{i}"), "s1", "c1", Role::Student, at))
                .await
                .unwrap();
        }
        let key = ConversationKey::new(&UserId::new("s1"), &UserId::new("c1"));
        let latest = thread(&db, &key, Some(2)).await.unwrap();
        let ids: Vec<&str> = latest.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(thread(&db, &key, None).await.unwrap().len(), 3);
    }
}
