use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use arosa_db::models::ConversationRow;
use arosa_types::api::{Envelope, MessagesPayload, RecordPayload, SendMessageRequest};
use arosa_types::models::Message;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::middleware::CurrentUser;
use crate::with_db;

async fn load_conversation(state: &AppState, id: i64) -> Result<ConversationRow, ApiError> {
    with_db(state, move |db| db.get_conversation(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Conversation introuvable".into()))
}

/// POST /conversation/{id}/messages: participants only.
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("Message vide".into()));
    }
    let conversation = load_conversation(&state, id).await?;
    if !conversation.involves(user.id()) {
        return Err(ApiError::forbidden());
    }

    let sender = user.id();
    let row = with_db(&state, move |db| db.insert_message(id, sender, &req.content)).await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(
            "Message envoyé",
            RecordPayload {
                record: Message::from(row),
            },
        )),
    ))
}

/// GET /conversation/{id}/messages: participants or admin. The thread is
/// marked seen once the recipient of its latest message reads it.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = load_conversation(&state, id).await?;
    let participant = conversation.involves(user.id());
    if !participant && !user.is_admin() {
        return Err(ApiError::forbidden());
    }

    let reader = user.id();
    let rows = with_db(&state, move |db| {
        let rows = db.list_messages(id)?;
        if participant {
            db.mark_seen_by(id, reader)?;
        }
        Ok(rows)
    })
    .await?;

    Ok(Json(Envelope::ok(
        "Messages trouvés",
        MessagesPayload {
            record: rows.into_iter().map(Message::from).collect(),
        },
    )))
}
