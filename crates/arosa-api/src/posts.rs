use std::collections::HashMap;

use axum::{
    Extension,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, warn};

use arosa_db::posts::{AcceptOutcome, NewPost};
use arosa_types::api::{Envelope, Nothing, PageQuery, PostsPayload, RecordPayload, StatePayload};
use arosa_types::models::Post;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::CurrentUser;
use crate::with_db;

pub const MAX_IMAGES: usize = 3;

/// Text fields of the multipart post form, by name.
#[derive(Debug, Default)]
struct PostForm {
    fields: HashMap<String, String>,
}

impl PostForm {
    fn text(&mut self, name: &str) -> String {
        self.fields.remove(name).unwrap_or_default()
    }

    fn flag(&mut self, name: &str) -> bool {
        self.text(name).trim() == "true"
    }

    /// RFC 3339 or a bare `YYYY-MM-DD`; absent or empty means now.
    fn date(&mut self, name: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ApiError> {
        let raw = self.text(name);
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(now);
        }
        raw.parse::<DateTime<Utc>>()
            .or_else(|_| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
            })
            .map_err(|_| ApiError::Validation(format!("Date invalide: {name}")))
    }

    fn user_id(&mut self, name: &str) -> Result<Option<i64>, ApiError> {
        let raw = self.text(name);
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse()
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("Identifiant invalide: {name}")))
    }

    fn into_new_post(mut self) -> Result<NewPost, ApiError> {
        let now = Utc::now();
        Ok(NewPost {
            title: self.text("title"),
            description: self.text("description"),
            published_at: self.date("publishedAt", now)?,
            date_start: self.date("dateStart", now)?,
            date_end: self.date("dateEnd", now)?,
            address: self.text("address"),
            city_name: self.text("cityName"),
            state: self.flag("state"),
            accepted: self.flag("accepted"),
            accepted_by: self.user_id("acceptedBy")?,
            plant_origin: self.text("plantOrigin"),
            plant_requirements: self.text("plantRequirements"),
            plant_type: self.text("plantType"),
        })
    }
}

fn image_key(post_id: i64, index: usize) -> String {
    format!("posts/{post_id}_{index}.jpg")
}

/// POST /post: multipart form with up to three image parts.
///
/// The row is inserted first so the images can be keyed by its id. When an
/// upload fails, the objects already stored and the row are removed again.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart?;
    let mut form = PostForm::default();
    let mut images: Vec<Bytes> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Formulaire invalide: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_some() {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Fichier illisible: {e}")))?;
            if data.is_empty() {
                continue;
            }
            if images.len() == MAX_IMAGES {
                return Err(ApiError::Validation(format!("{MAX_IMAGES} images maximum")));
            }
            images.push(data);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(format!("Champ illisible: {e}")))?;
            form.fields.insert(name, value);
        }
    }

    let new_post = form.into_new_post()?;
    let owner_id = user.id();

    let post_id = with_db(&state, move |db| {
        if let Some(taker) = new_post.accepted_by {
            if db.get_user_by_id(taker)?.is_none() {
                return Ok(None);
            }
        }
        db.insert_post(owner_id, &new_post).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Utilisateur introuvable".into()))?;

    let mut urls = Vec::with_capacity(images.len());
    for (index, data) in images.iter().enumerate() {
        match state.media.put(&image_key(post_id, index), data).await {
            Ok(url) => urls.push(url),
            Err(e) => {
                error!("Upload of image {} for post {} failed: {:#}", index, post_id, e);
                discard_post(&state, post_id, urls.len()).await;
                return Err(ApiError::internal("Création post échouée")(e));
            }
        }
    }

    let stored = urls.clone();
    let saved = with_db(&state, move |db| {
        db.set_post_images(post_id, &stored)?;
        db.get_post(post_id)
    })
    .await;
    let row = match saved {
        Ok(Some(row)) => row,
        Ok(None) => {
            discard_post(&state, post_id, urls.len()).await;
            return Err(ApiError::NotFound("Aucun post trouvé".into()));
        }
        Err(e) => {
            discard_post(&state, post_id, urls.len()).await;
            return Err(e);
        }
    };

    info!(
        "Post {} created by user {} with {} images",
        post_id,
        owner_id,
        urls.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(
            "Création post ok",
            RecordPayload {
                record: Post::from(row),
            },
        )),
    ))
}

/// Compensation for a failed creation: drop the first `uploaded` images and
/// the row. Failures here are only logged.
async fn discard_post(state: &AppState, post_id: i64, uploaded: usize) {
    for index in 0..uploaded {
        if let Err(e) = state.media.delete(&image_key(post_id, index)).await {
            warn!("Could not remove image {} of post {}: {}", index, post_id, e);
        }
    }
    if let Err(e) = with_db(state, move |db| db.delete_post(post_id)).await {
        warn!("Could not remove half-created post {}: {}", post_id, e);
    }
}

/// GET /post?amont=&saut=: the public feed.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = (page.limit(), page.offset());
    let rows = with_db(&state, move |db| db.list_visible_posts(limit, offset)).await?;

    Ok(Json(Envelope::ok(
        "Posts trouvés",
        PostsPayload {
            posts: rows.into_iter().map(Post::from).collect(),
        },
    )))
}

/// GET /post/{id}
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = with_db(&state, move |db| db.get_post(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Aucun post trouvé".into()))?;

    Ok(Json(Envelope::ok(
        "Post trouvé",
        RecordPayload {
            record: Post::from(row),
        },
    )))
}

/// GET /post/user/{id}
pub async fn list_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, move |db| db.list_posts_by_user(user_id)).await?;

    Ok(Json(Envelope::ok(
        "Posts trouvés",
        RecordPayload {
            record: rows.into_iter().map(Post::from).collect::<Vec<_>>(),
        },
    )))
}

/// PATCH /post/{id}/visibility: owner or admin.
pub async fn toggle_visibility(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let post = with_db(&state, move |db| db.get_post(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Aucun post trouvé".into()))?;
    user.ensure_owner_or_admin(post.user_id)?;

    let new_state = with_db(&state, move |db| db.toggle_post_state(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Aucun post trouvé".into()))?;

    Ok(Json(Envelope::ok(
        "Changement de visibilité effectué",
        StatePayload { state: new_state },
    )))
}

/// PATCH /post/{id}/accept: claim someone else's visible listing.
pub async fn accept_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let post = with_db(&state, move |db| db.get_post(id))
        .await?
        .filter(|post| !post.state)
        .ok_or_else(|| ApiError::NotFound("Aucun post trouvé".into()))?;
    if post.user_id == user.id() {
        return Err(ApiError::Forbidden("Impossible d'accepter son propre post".into()));
    }

    let taker = user.id();
    match with_db(&state, move |db| db.accept_post(id, taker)).await? {
        AcceptOutcome::Accepted => {}
        AcceptOutcome::AlreadyAccepted => {
            return Err(ApiError::Conflict("Post déjà accepté".into()));
        }
        AcceptOutcome::NotFound => return Err(ApiError::NotFound("Aucun post trouvé".into())),
    }

    let row = with_db(&state, move |db| db.get_post(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Aucun post trouvé".into()))?;
    info!("Post {} accepted by user {}", id, taker);

    Ok(Json(Envelope::ok(
        "Post accepté",
        RecordPayload {
            record: Post::from(row),
        },
    )))
}

/// DELETE /post/{id}: owner or admin.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let post = with_db(&state, move |db| db.get_post(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Aucun post trouvé".into()))?;
    user.ensure_owner_or_admin(post.user_id)?;

    if !with_db(&state, move |db| db.delete_post(id)).await? {
        return Err(ApiError::NotFound("Aucun post trouvé".into()));
    }
    state.media.delete_urls(post.image_urls()).await;
    info!("Post {} deleted by user {}", id, user.id());

    Ok(Json(Envelope::ok("Post bien supprimé", Nothing {})))
}
