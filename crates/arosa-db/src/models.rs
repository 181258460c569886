//! Database row types. These map directly to SQLite rows and stay separate
//! from the wire models in `arosa-types`.

use arosa_types::models::{
    Conversation, ConversationWithPeer, Message, Post, PrivateProfile, PublicProfile, role_label,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    pub city_name: String,
    pub password: String,
    pub uid: String,
    pub is_admin: bool,
    pub is_botanist: bool,
    pub photo: String,
    pub created_at: String,
}

impl UserRow {
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            last_name: self.last_name.clone(),
            first_name: self.first_name.clone(),
            city_name: self.city_name.clone(),
            role: role_label(self.is_botanist).to_string(),
            photo: self.photo.clone(),
            created_at: parse_timestamp(&self.created_at, "users.created_at"),
        }
    }

    pub fn private_profile(&self) -> PrivateProfile {
        PrivateProfile {
            id: self.id,
            last_name: self.last_name.clone(),
            first_name: self.first_name.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            city_name: self.city_name.clone(),
            role: role_label(self.is_botanist).to_string(),
            is_admin: self.is_admin,
            photo: self.photo.clone(),
            uid: self.uid.clone(),
            created_at: parse_timestamp(&self.created_at, "users.created_at"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub date_start: String,
    pub date_end: String,
    pub address: String,
    pub city_name: String,
    pub state: bool,
    pub accepted: bool,
    pub accepted_by: Option<i64>,
    pub user_id: i64,
    pub plant_origin: String,
    pub plant_requirements: String,
    pub plant_type: String,
    pub image1: String,
    pub image2: String,
    pub image3: String,
}

impl PostRow {
    /// Non-empty image URLs, in slot order.
    pub fn image_urls(&self) -> Vec<&str> {
        [&self.image1, &self.image2, &self.image3]
            .into_iter()
            .filter(|url| !url.is_empty())
            .map(String::as_str)
            .collect()
    }
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            published_at: parse_timestamp(&row.published_at, "posts.published_at"),
            date_start: parse_timestamp(&row.date_start, "posts.date_start"),
            date_end: parse_timestamp(&row.date_end, "posts.date_end"),
            title: row.title,
            description: row.description,
            address: row.address,
            city_name: row.city_name,
            state: row.state,
            accepted: row.accepted,
            accepted_by: row.accepted_by,
            user_id: row.user_id,
            plant_origin: row.plant_origin,
            plant_requirements: row.plant_requirements,
            plant_type: row.plant_type,
            image1: row.image1,
            image2: row.image2,
            image3: row.image3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: i64,
    pub user1_id: i64,
    pub user2_id: i64,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub seen: bool,
}

impl ConversationRow {
    pub fn involves(&self, user_id: i64) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            user1_id: row.user1_id,
            user2_id: row.user2_id,
            date_start: row
                .date_start
                .as_deref()
                .map(|raw| parse_timestamp(raw, "conversations.date_start")),
            date_end: row
                .date_end
                .as_deref()
                .map(|raw| parse_timestamp(raw, "conversations.date_end")),
            seen: row.seen,
        }
    }
}

/// Conversation joined with the profile of the participant who is not the
/// requesting user.
#[derive(Debug, Clone)]
pub struct ConversationPeerRow {
    pub conversation: ConversationRow,
    pub peer_id: i64,
    pub peer_first_name: String,
    pub peer_last_name: String,
    pub peer_photo: String,
}

impl From<ConversationPeerRow> for ConversationWithPeer {
    fn from(row: ConversationPeerRow) -> Self {
        ConversationWithPeer {
            conversation: row.conversation.into(),
            peer_id: row.peer_id,
            peer_first_name: row.peer_first_name,
            peer_last_name: row.peer_last_name,
            peer_photo: row.peer_photo,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub sent_at: String,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            sent_at: parse_timestamp(&row.sent_at, "messages.sent_at"),
            content: row.content,
        }
    }
}

/// Formats a timestamp the way it is stored.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Rows written by us are RFC 3339; SQLite defaults are
/// "YYYY-MM-DD HH:MM:SS" without a zone and are read as UTC.
pub fn parse_timestamp(raw: &str, column: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' in {}: {}", raw, column, e);
            DateTime::default()
        })
}
