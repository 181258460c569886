use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use tracing::info;

use arosa_db::users::UserUpdate;
use arosa_types::api::{
    BotanistRequest, Envelope, Nothing, PageQuery, RecordPayload, UpdateUserRequest, UsersPayload,
};

use crate::auth::{AppState, hash_password};
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::CurrentUser;
use crate::with_db;

/// GET /user?amont=&saut=
pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = (page.limit(), page.offset());
    let rows = with_db(&state, move |db| db.list_users(limit, offset)).await?;

    Ok(Json(Envelope::ok(
        "Utilisateurs trouvés",
        UsersPayload {
            users: rows.iter().map(|row| row.public_profile()).collect(),
        },
    )))
}

/// GET /user/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = with_db(&state, move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Utilisateur introuvable".into()))?;

    Ok(Json(Envelope::ok(
        "Utilisateur trouvé",
        RecordPayload {
            record: row.public_profile(),
        },
    )))
}

/// GET /user/me
pub async fn me(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    Json(Envelope::ok(
        "Utilisateur trouvé",
        RecordPayload {
            record: user.0.private_profile(),
        },
    ))
}

/// PUT /user: the caller replaces their own profile fields.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !req.email.contains('@') {
        return Err(ApiError::Validation("Email invalide".into()));
    }

    let password_hash = match req.password.clone().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    let id = user.id();
    let updated = with_db(&state, move |db| {
        let applied = db.update_user(
            id,
            &UserUpdate {
                last_name: &req.last_name,
                first_name: &req.first_name,
                email: &req.email,
                address: &req.address,
                phone: &req.phone,
                city_name: &req.city_name,
                password_hash: password_hash.as_deref(),
            },
        )?;
        if !applied {
            return Ok(None);
        }
        db.get_user_by_id(id)
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("Email déjà existant".into()))?;

    info!("User {} updated their profile", id);

    Ok(Json(Envelope::ok(
        "Modification réussie",
        RecordPayload {
            record: updated.private_profile(),
        },
    )))
}

/// DELETE /user/{id}: self or admin. Also drops the images of the user's
/// posts.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    user.ensure_owner_or_admin(id)?;

    let image_urls = with_db(&state, move |db| {
        if db.get_user_by_id(id)?.is_none() {
            return Ok(None);
        }
        let urls: Vec<String> = db
            .list_posts_by_user(id)?
            .iter()
            .flat_map(|post| post.image_urls().into_iter().map(str::to_string).collect::<Vec<_>>())
            .collect();
        db.delete_user(id)?;
        Ok(Some(urls))
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Utilisateur introuvable".into()))?;

    state.media.delete_urls(image_urls.iter().map(String::as_str)).await;
    info!("User {} deleted by {}", id, user.id());

    Ok(Json(Envelope::ok("Utilisateur supprimé", Nothing {})))
}

/// PATCH /user/{id}/botanist: admins grant or revoke the botanist role.
pub async fn set_botanist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<BotanistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::forbidden());
    }

    let is_botanist = req.is_botanist;
    let row = with_db(&state, move |db| {
        if !db.set_botanist(id, is_botanist)? {
            return Ok(None);
        }
        db.get_user_by_id(id)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Utilisateur introuvable".into()))?;

    info!("User {} botanist={} (by admin {})", id, is_botanist, user.id());

    Ok(Json(Envelope::ok(
        "Rôle mis à jour",
        RecordPayload {
            record: row.public_profile(),
        },
    )))
}
