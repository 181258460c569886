pub mod conversations;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod users;

use anyhow::{Result, anyhow};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

pub const DEFAULT_READER_POOL_SIZE: usize = 4;

/// Data-access object over one SQLite file: a single writer connection plus
/// a fixed pool of read-only connections. Built once at start-up and shared
/// through the application state.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path, reader_count: usize) -> Result<Self> {
        let mut writer = Connection::open(path)?;

        // WAL mode so readers don't block the writer
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&mut writer)?;

        let reader_count = reader_count.max(1);
        let mut readers = Vec::with_capacity(reader_count);
        for _ in 0..reader_count {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            reader_count
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self
            .readers
            .get(idx)
            .ok_or_else(|| anyhow!("Reader pool is empty"))?
            .lock()
            .map_err(|e| anyhow!("Reader lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .writer
            .lock()
            .map_err(|e| anyhow!("Writer lock poisoned: {}", e))?;
        f(&mut conn)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    use super::Database;
    use crate::users::NewUser;

    /// Temp directory removed when dropped.
    pub struct TempDir(PathBuf);

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    /// Fresh database in its own temp directory. Keep the guard alive for
    /// as long as the database is used.
    pub fn temp_db() -> (Database, TempDir) {
        let dir = std::env::temp_dir().join(format!("arosa-db-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let db = Database::open(&dir.join("test.db"), 2).unwrap();
        (db, TempDir(dir))
    }

    pub fn add_user(db: &Database, email: &str) -> i64 {
        db.create_user(&NewUser {
            last_name: "Durand",
            first_name: "Alice",
            email,
            address: "1 rue des Lilas",
            phone: "0600000000",
            city_name: "Lyon",
            password_hash: "hash",
            uid: &format!("uid-{email}"),
            photo: "https://example.test/default.png",
        })
        .unwrap()
        .expect("email should be free")
    }
}
