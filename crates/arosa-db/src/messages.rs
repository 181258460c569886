use anyhow::Result;
use chrono::Utc;
use rusqlite::params;

use crate::Database;
use crate::models::{MessageRow, format_timestamp};

impl Database {
    /// Appends a message and marks the conversation unseen.
    pub fn insert_message(&self, conversation_id: i64, sender_id: i64, content: &str) -> Result<MessageRow> {
        let sent_at = format_timestamp(&Utc::now());
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (conversation_id, sender_id, content, sent_at) VALUES (?1, ?2, ?3, ?4)",
                params![conversation_id, sender_id, content, sent_at],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute("UPDATE conversations SET seen = 0 WHERE id = ?1", [conversation_id])?;
            tx.commit()?;
            Ok(MessageRow {
                id,
                conversation_id,
                sender_id,
                content: content.to_string(),
                sent_at,
            })
        })
    }

    pub fn list_messages(&self, conversation_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, content, sent_at
                 FROM messages WHERE conversation_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([conversation_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        content: row.get(3)?,
                        sent_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_messages(&self, conversation_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                [conversation_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{add_user, temp_db};

    #[test]
    fn new_message_resets_seen() {
        let (db, _dir) = temp_db();
        let a = add_user(&db, "a@x.com");
        let b = add_user(&db, "b@x.com");
        let id = db.find_or_create_conversation(a, b, None, None).unwrap().id();
        db.insert_message(id, a, "Bonjour").unwrap();
        assert!(db.mark_seen_by(id, b).unwrap());
        assert!(db.get_conversation(id).unwrap().unwrap().seen);

        let msg = db.insert_message(id, b, "La bouture est prête").unwrap();
        assert_eq!(msg.sender_id, b);
        assert!(!db.get_conversation(id).unwrap().unwrap().seen);

        let listed = db.list_messages(id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].content, "La bouture est prête");
    }

    #[test]
    fn sender_reading_own_message_keeps_it_unseen() {
        let (db, _dir) = temp_db();
        let a = add_user(&db, "a@x.com");
        let b = add_user(&db, "b@x.com");
        let id = db.find_or_create_conversation(a, b, None, None).unwrap().id();

        // no messages yet: nothing to acknowledge
        assert!(!db.mark_seen_by(id, a).unwrap());

        db.insert_message(id, b, "Salut").unwrap();
        assert!(!db.mark_seen_by(id, b).unwrap());
        assert!(!db.get_conversation(id).unwrap().unwrap().seen);

        assert!(db.mark_seen_by(id, a).unwrap());
        assert!(db.get_conversation(id).unwrap().unwrap().seen);
    }
}
