use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use arosa_db::conversations::ConversationSlot;
use arosa_types::api::{
    ConversationsPayload, CreateConversationRequest, DeletedConversationPayload, Envelope,
    IdPayload, MyConversationsPayload,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::middleware::CurrentUser;
use crate::with_db;

/// POST /conversation: idempotent on the unordered pair of users.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user1, user2) = (req.id_user1, req.id_user2);
    if user1 == user2 {
        return Err(ApiError::Validation(
            "Une conversation nécessite deux utilisateurs distincts".into(),
        ));
    }
    if !user.is_admin() && user.id() != user1 && user.id() != user2 {
        return Err(ApiError::forbidden());
    }

    let slot = with_db(&state, move |db| {
        if db.get_user_by_id(user1)?.is_none() || db.get_user_by_id(user2)?.is_none() {
            return Ok(None);
        }
        db.find_or_create_conversation(user1, user2, req.date_start, req.date_end)
            .map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Utilisateur introuvable".into()))?;

    let (status, msg) = match slot {
        ConversationSlot::Created(id) => {
            info!("Conversation {} created between {} and {}", id, user1, user2);
            (StatusCode::CREATED, "Conversation bien ajoutée")
        }
        ConversationSlot::Existing(_) => (StatusCode::OK, "Conversation déjà existante"),
    };

    Ok((status, Json(Envelope::ok(msg, IdPayload { id: slot.id() }))))
}

/// GET /conversation
pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, |db| db.list_conversations()).await?;
    let msg = if rows.is_empty() {
        "Aucune conversation répertoriée"
    } else {
        "Conversations bien trouvées"
    };

    Ok(Json(Envelope::ok(
        msg,
        ConversationsPayload {
            record: rows.into_iter().map(Into::into).collect(),
        },
    )))
}

/// GET /conversation/mine: the caller's conversations with peer details.
pub async fn list_my_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let id = user.id();
    let rows = with_db(&state, move |db| db.list_conversations_for_user(id)).await?;

    Ok(Json(Envelope::ok(
        "Conversations bien trouvées",
        MyConversationsPayload {
            record: rows.into_iter().map(Into::into).collect(),
        },
    )))
}

/// DELETE /conversation/{id}: participant or admin; messages go with it.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = with_db(&state, move |db| db.get_conversation(id))
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("Conversation cible introuvable ou déjà supprimée".into())
        })?;
    if !user.is_admin() && !conversation.involves(user.id()) {
        return Err(ApiError::forbidden());
    }

    let messages_deleted = with_db(&state, move |db| db.delete_conversation(id))
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("Conversation cible introuvable ou déjà supprimée".into())
        })?;

    Ok(Json(Envelope::ok(
        "Conversation bien supprimée",
        DeletedConversationPayload { messages_deleted },
    )))
}
