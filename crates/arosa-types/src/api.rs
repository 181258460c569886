use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Conversation, ConversationWithPeer, Message, Post, PrivateProfile, PublicProfile, Species,
};

// -- Envelope --

/// Every response body is `{ success, msg?, ...payload }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(msg: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            msg: Some(msg.into()),
            data,
        }
    }
}

impl Envelope<Nothing> {
    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: Some(msg.into()),
            data: Nothing {},
        }
    }
}

/// Empty payload.
#[derive(Debug, Serialize)]
pub struct Nothing {}

#[derive(Debug, Serialize)]
pub struct RecordPayload<T: Serialize> {
    pub record: T,
}

// -- Pagination --

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// `amont` is the page size, `saut` the number of rows skipped.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub amont: Option<u32>,
    pub saut: Option<u32>,
}

impl PageQuery {
    /// Missing or zero `amont` falls back to the default page size.
    pub fn limit(&self) -> u32 {
        match self.amont {
            None | Some(0) => DEFAULT_PAGE_SIZE,
            Some(n) => n.min(MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u32 {
        self.saut.unwrap_or(0)
    }
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub first_name: String,
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub city_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    pub city_name: String,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginPayload {
    pub user: PrivateProfile,
    /// Short-lived signed session token, accepted in place of the `uid`.
    pub session: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BotanistRequest {
    pub is_botanist: bool,
}

#[derive(Debug, Serialize)]
pub struct UsersPayload {
    pub users: Vec<PublicProfile>,
}

// -- Posts --

#[derive(Debug, Serialize)]
pub struct PostsPayload {
    pub posts: Vec<Post>,
}

#[derive(Debug, Serialize)]
pub struct StatePayload {
    pub state: bool,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateConversationRequest {
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    pub id_user1: i64,
    pub id_user2: i64,
}

#[derive(Debug, Serialize)]
pub struct IdPayload {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct ConversationsPayload {
    pub record: Vec<Conversation>,
}

#[derive(Debug, Serialize)]
pub struct MyConversationsPayload {
    pub record: Vec<ConversationWithPeer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedConversationPayload {
    pub messages_deleted: usize,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessagesPayload {
    pub record: Vec<Message>,
}

// -- Species --

pub const DEFAULT_SPECIES_PAGE_SIZE: u32 = 300;
pub const MAX_SPECIES_PAGE_SIZE: u32 = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SpeciesPayload {
    pub species: Vec<Species>,
}
