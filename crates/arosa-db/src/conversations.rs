use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tracing::info;

use crate::Database;
use crate::models::{ConversationPeerRow, ConversationRow, format_timestamp};

const CONVERSATION_COLUMNS: &str = "id, user1_id, user2_id, date_start, date_end, seen";

/// Result of asking for a conversation between two users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationSlot {
    Created(i64),
    Existing(i64),
}

impl ConversationSlot {
    pub fn id(self) -> i64 {
        match self {
            Self::Created(id) | Self::Existing(id) => id,
        }
    }
}

impl Database {
    /// Returns the conversation between `user1` and `user2` in either order,
    /// creating it when none exists. Lookup and insert share one write
    /// transaction.
    pub fn find_or_create_conversation(
        &self,
        user1: i64,
        user2: i64,
        date_start: Option<DateTime<Utc>>,
        date_end: Option<DateTime<Utc>>,
    ) -> Result<ConversationSlot> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM conversations
                     WHERE (user1_id = ?1 AND user2_id = ?2) OR (user1_id = ?2 AND user2_id = ?1)",
                    params![user1, user2],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Ok(ConversationSlot::Existing(id));
            }

            tx.execute(
                "INSERT INTO conversations (user1_id, user2_id, date_start, date_end, seen)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                params![
                    user1,
                    user2,
                    date_start.as_ref().map(format_timestamp),
                    date_end.as_ref().map(format_timestamp),
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(ConversationSlot::Created(id))
        })
    }

    pub fn get_conversation(&self, id: i64) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
            let row = conn.query_row(&sql, [id], map_conversation).optional()?;
            Ok(row)
        })
    }

    pub fn list_conversations(&self) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_conversation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Conversations where `user_id` is either participant, joined with the
    /// other participant's profile (single query, no N+1).
    pub fn list_conversations_for_user(&self, user_id: i64) -> Result<Vec<ConversationPeerRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.user1_id, c.user2_id, c.date_start, c.date_end, c.seen,
                        u.id, u.first_name, u.last_name, u.photo
                 FROM conversations c
                 JOIN users u
                   ON u.id = CASE WHEN c.user1_id = ?1 THEN c.user2_id ELSE c.user1_id END
                 WHERE c.user1_id = ?1 OR c.user2_id = ?1
                 ORDER BY c.id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationPeerRow {
                        conversation: map_conversation(row)?,
                        peer_id: row.get(6)?,
                        peer_first_name: row.get(7)?,
                        peer_last_name: row.get(8)?,
                        peer_photo: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes a conversation and all of its messages atomically. Returns
    /// the number of messages removed, or `None` if the conversation did not
    /// exist.
    pub fn delete_conversation(&self, id: i64) -> Result<Option<usize>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let messages = tx.execute("DELETE FROM messages WHERE conversation_id = ?1", [id])?;
            let deleted = tx.execute("DELETE FROM conversations WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Ok(None);
            }
            tx.commit()?;
            info!("Conversation {} deleted with {} messages", id, messages);
            Ok(Some(messages))
        })
    }

    /// Marks the conversation seen when `reader` did not send its latest
    /// message. Returns whether the flag was set.
    pub fn mark_seen_by(&self, id: i64, reader: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE conversations SET seen = 1
                 WHERE id = ?1
                   AND (SELECT sender_id FROM messages
                        WHERE conversation_id = ?1 ORDER BY id DESC LIMIT 1) <> ?2",
                params![id, reader],
            )?;
            Ok(changed > 0)
        })
    }
}

fn map_conversation(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        user1_id: row.get(1)?,
        user2_id: row.get(2)?,
        date_start: row.get(3)?,
        date_end: row.get(4)?,
        seen: row.get(5)?,
    })
}
