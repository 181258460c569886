use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::Database;
use crate::models::{PostRow, format_timestamp};

const POST_COLUMNS: &str = "id, title, description, published_at, date_start, date_end, address, \
     city_name, state, accepted, accepted_by, user_id, plant_origin, plant_requirements, \
     plant_type, image1, image2, image3";

pub struct NewPost {
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
    pub address: String,
    pub city_name: String,
    pub state: bool,
    pub accepted: bool,
    pub accepted_by: Option<i64>,
    pub plant_origin: String,
    pub plant_requirements: String,
    pub plant_type: String,
}

/// Outcome of claiming a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    NotFound,
    AlreadyAccepted,
}

impl Database {
    /// Inserts the post row with empty image slots and returns its id.
    pub fn insert_post(&self, user_id: i64, post: &NewPost) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (title, description, published_at, date_start, date_end, address,
                                    city_name, state, accepted, accepted_by, user_id, plant_origin,
                                    plant_requirements, plant_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    post.title,
                    post.description,
                    format_timestamp(&post.published_at),
                    format_timestamp(&post.date_start),
                    format_timestamp(&post.date_end),
                    post.address,
                    post.city_name,
                    post.state,
                    post.accepted,
                    post.accepted_by,
                    user_id,
                    post.plant_origin,
                    post.plant_requirements,
                    post.plant_type,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Fills the three image slots; missing entries become empty strings.
    pub fn set_post_images(&self, id: i64, urls: &[String]) -> Result<()> {
        let slot = |i: usize| urls.get(i).map(String::as_str).unwrap_or("");
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE posts SET image1 = ?1, image2 = ?2, image3 = ?3 WHERE id = ?4",
                params![slot(0), slot(1), slot(2), id],
            )?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1");
            let row = conn.query_row(&sql, [id], map_post).optional()?;
            Ok(row)
        })
    }

    /// Feed page: visible posts only, in id order so consecutive pages
    /// neither overlap nor skip rows while the data is unchanged.
    pub fn list_visible_posts(&self, limit: u32, offset: u32) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE state = 0 ORDER BY id LIMIT ?1 OFFSET ?2"
            );
            collect_posts(conn, &sql, params![limit, offset])
        })
    }

    pub fn list_posts_by_user(&self, user_id: i64) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?1 ORDER BY id");
            collect_posts(conn, &sql, params![user_id])
        })
    }

    /// Flips the visibility flag and returns the new value.
    pub fn toggle_post_state(&self, id: i64) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current: Option<bool> = tx
                .query_row("SELECT state FROM posts WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            let Some(current) = current else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE posts SET state = ?1 WHERE id = ?2",
                params![!current, id],
            )?;
            tx.commit()?;
            Ok(Some(!current))
        })
    }

    pub fn accept_post(&self, id: i64, accepted_by: i64) -> Result<AcceptOutcome> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE posts SET accepted = 1, accepted_by = ?1 WHERE id = ?2 AND accepted = 0",
                params![accepted_by, id],
            )?;
            if n > 0 {
                return Ok(AcceptOutcome::Accepted);
            }
            let exists: Option<i64> = conn
                .query_row("SELECT id FROM posts WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            Ok(match exists {
                Some(_) => AcceptOutcome::AlreadyAccepted,
                None => AcceptOutcome::NotFound,
            })
        })
    }

    pub fn delete_post(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

fn collect_posts(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_post)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        published_at: row.get(3)?,
        date_start: row.get(4)?,
        date_end: row.get(5)?,
        address: row.get(6)?,
        city_name: row.get(7)?,
        state: row.get(8)?,
        accepted: row.get(9)?,
        accepted_by: row.get(10)?,
        user_id: row.get(11)?,
        plant_origin: row.get(12)?,
        plant_requirements: row.get(13)?,
        plant_type: row.get(14)?,
        image1: row.get(15)?,
        image2: row.get(16)?,
        image3: row.get(17)?,
    })
}
