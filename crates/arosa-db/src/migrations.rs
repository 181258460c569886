use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, posts, conversations, messages)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                last_name   TEXT NOT NULL DEFAULT '',
                first_name  TEXT NOT NULL DEFAULT '',
                email       TEXT NOT NULL UNIQUE,
                address     TEXT NOT NULL DEFAULT '',
                phone       TEXT NOT NULL DEFAULT '',
                city_name   TEXT NOT NULL DEFAULT '',
                password    TEXT NOT NULL,
                uid         TEXT NOT NULL UNIQUE,
                is_admin    INTEGER NOT NULL DEFAULT 0,
                is_botanist INTEGER NOT NULL DEFAULT 0,
                photo       TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE posts (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                title               TEXT NOT NULL DEFAULT '',
                description         TEXT NOT NULL DEFAULT '',
                published_at        TEXT NOT NULL,
                date_start          TEXT NOT NULL,
                date_end            TEXT NOT NULL,
                address             TEXT NOT NULL DEFAULT '',
                city_name           TEXT NOT NULL DEFAULT '',
                state               INTEGER NOT NULL DEFAULT 0,
                accepted            INTEGER NOT NULL DEFAULT 0,
                accepted_by         INTEGER REFERENCES users(id) ON DELETE SET NULL,
                user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                plant_origin        TEXT NOT NULL DEFAULT '',
                plant_requirements  TEXT NOT NULL DEFAULT '',
                plant_type          TEXT NOT NULL DEFAULT '',
                image1              TEXT NOT NULL DEFAULT '',
                image2              TEXT NOT NULL DEFAULT '',
                image3              TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX idx_posts_user ON posts(user_id);
            CREATE INDEX idx_posts_state ON posts(state, id);

            CREATE TABLE conversations (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user1_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                user2_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                date_start  TEXT,
                date_end    TEXT,
                seen        INTEGER NOT NULL DEFAULT 0,
                CHECK (user1_id <> user2_id)
            );

            -- One conversation per unordered pair of users
            CREATE UNIQUE INDEX idx_conversations_pair
                ON conversations(min(user1_id, user2_id), max(user1_id, user2_id));

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                sent_at         TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation ON messages(conversation_id, id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
