use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{info, warn};

use crate::Database;
use crate::models::UserRow;

const USER_COLUMNS: &str = "id, last_name, first_name, email, address, phone, city_name, \
     password, uid, is_admin, is_botanist, photo, created_at";

pub struct NewUser<'a> {
    pub last_name: &'a str,
    pub first_name: &'a str,
    pub email: &'a str,
    pub address: &'a str,
    pub phone: &'a str,
    pub city_name: &'a str,
    pub password_hash: &'a str,
    pub uid: &'a str,
    pub photo: &'a str,
}

/// Replacement values for a self-update. `password_hash` is left untouched
/// when `None`.
pub struct UserUpdate<'a> {
    pub last_name: &'a str,
    pub first_name: &'a str,
    pub email: &'a str,
    pub address: &'a str,
    pub phone: &'a str,
    pub city_name: &'a str,
    pub password_hash: Option<&'a str>,
}

impl Database {
    /// Inserts a user unless the email is taken. Returns `None` on a
    /// duplicate email.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            if email_owner(conn, user.email)?.is_some() {
                return Ok(None);
            }
            conn.execute(
                "INSERT INTO users (last_name, first_name, email, address, phone, city_name, password, uid, photo)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.last_name,
                    user.first_name,
                    user.email,
                    user.address,
                    user.phone,
                    user.city_name,
                    user.password_hash,
                    user.uid,
                    user.photo,
                ],
            )?;
            Ok(Some(conn.last_insert_rowid()))
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_uid(&self, uid: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "uid = ?1", uid))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn list_users(&self, limit: u32, offset: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT ?1 OFFSET ?2");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit, offset], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Applies a self-update. Returns `false` when the new email already
    /// belongs to another account; nothing is written in that case.
    pub fn update_user(&self, id: i64, update: &UserUpdate<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if email_owner(&tx, update.email)?.is_some_and(|owner| owner != id) {
                return Ok(false);
            }
            tx.execute(
                "UPDATE users SET last_name = ?1, first_name = ?2, email = ?3, address = ?4,
                        phone = ?5, city_name = ?6, password = COALESCE(?7, password)
                 WHERE id = ?8",
                params![
                    update.last_name,
                    update.first_name,
                    update.email,
                    update.address,
                    update.phone,
                    update.city_name,
                    update.password_hash,
                    id,
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Hard delete. Posts, conversations and messages go with it through
    /// the foreign keys.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    pub fn set_botanist(&self, id: i64, is_botanist: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET is_botanist = ?1 WHERE id = ?2",
                params![is_botanist, id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_admin(&self, id: i64, is_admin: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET is_admin = ?1 WHERE id = ?2",
                params![is_admin, id],
            )?;
            Ok(n > 0)
        })
    }

    /// Grants the admin flag to the accounts registered under `emails`.
    /// Addresses without an account are skipped. Returns how many accounts
    /// were newly promoted.
    pub fn promote_admins(&self, emails: &[String]) -> Result<usize> {
        let mut promoted = 0;
        for email in emails {
            match self.get_user_by_email(email)? {
                Some(user) if user.is_admin => {}
                Some(user) => {
                    self.set_admin(user.id, true)?;
                    info!("User {} ({}) promoted to admin", user.id, email);
                    promoted += 1;
                }
                None => warn!("Admin e-mail {} has no account yet", email),
            }
        }
        Ok(promoted)
    }
}

fn email_owner(conn: &Connection, email: &str) -> Result<Option<i64>> {
    let owner = conn
        .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| row.get(0))
        .optional()?;
    Ok(owner)
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, filter: &str, value: P) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}");
    let row = conn.query_row(&sql, [value], map_user).optional()?;
    Ok(row)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        last_name: row.get(1)?,
        first_name: row.get(2)?,
        email: row.get(3)?,
        address: row.get(4)?,
        phone: row.get(5)?,
        city_name: row.get(6)?,
        password: row.get(7)?,
        uid: row.get(8)?,
        is_admin: row.get(9)?,
        is_botanist: row.get(10)?,
        photo: row.get(11)?,
        created_at: row.get(12)?,
    })
}
