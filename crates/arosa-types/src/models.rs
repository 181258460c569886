use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ROLE_BOTANIST: &str = "Botaniste";
pub const ROLE_USER: &str = "Utilisateur";

/// Role label shown by the mobile client.
pub fn role_label(is_botanist: bool) -> &'static str {
    if is_botanist { ROLE_BOTANIST } else { ROLE_USER }
}

/// What any visitor may see about a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: i64,
    pub last_name: String,
    pub first_name: String,
    pub city_name: String,
    pub role: String,
    pub photo: String,
    pub created_at: DateTime<Utc>,
}

/// The owner's view of their account. Carries the bearer `uid`, so it is
/// only returned to the account holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateProfile {
    pub id: i64,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    pub city_name: String,
    pub role: String,
    pub is_admin: bool,
    pub photo: String,
    pub uid: String,
    pub created_at: DateTime<Utc>,
}

/// A plant listing.
///
/// `state` is the visibility flag: `true` means hidden from the feed, not
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
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
    pub user_id: i64,
    pub plant_origin: String,
    pub plant_requirements: String,
    pub plant_type: String,
    pub image1: String,
    pub image2: String,
    pub image3: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    #[serde(rename = "idUser1")]
    pub user1_id: i64,
    #[serde(rename = "idUser2")]
    pub user2_id: i64,
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    pub seen: bool,
}

/// A conversation as listed for one participant, with the other side's
/// profile fields inlined.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationWithPeer {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub peer_id: i64,
    pub peer_first_name: String,
    pub peer_last_name: String,
    pub peer_photo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

/// One entry of the species picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    pub id: String,
    pub common_name: String,
    pub scientific_name: String,
    pub scientific_author: String,
    pub gbif_id: Option<i64>,
    pub powo_id: Option<String>,
}
