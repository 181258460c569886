use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use arosa_db::models::UserRow;

use crate::auth::{AppState, decode_session_token};
use crate::error::ApiError;
use crate::with_db;

/// The authenticated principal, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn is_admin(&self) -> bool {
        self.0.is_admin
    }

    /// Passes when the caller owns the record or is an admin.
    pub fn ensure_owner_or_admin(&self, owner_id: i64) -> Result<(), ApiError> {
        if self.is_admin() || self.id() == owner_id {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

/// Token from the `Authorization` header. Both a bare token and
/// `Bearer <token>` are accepted.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?
        .trim();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the caller from a signed session token or, failing that, from
/// the account `uid`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("Aucun token fourni".into()))?
        .to_string();

    let session_user = decode_session_token(&state.jwt_secret, &token);
    let user = with_db(&state, move |db| match session_user {
        Some(id) => db.get_user_by_id(id),
        None => db.get_user_by_uid(&token),
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Utilisateur introuvable".into()))?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
