use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::info;

use arosa_db::Database;
use arosa_db::users::NewUser;
use arosa_types::api::{CreateUserRequest, Envelope, LoginPayload, LoginRequest, RecordPayload};

use crate::error::ApiError;
use crate::extract::Json;
use crate::species::SpeciesClient;
use crate::storage::MediaStore;
use crate::{uid, with_db};

/// Lifetime of the signed session handed out at login.
const SESSION_HOURS: i64 = 2;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub media: MediaStore,
    pub species: SpeciesClient,
    /// Photo URL given to new accounts.
    pub default_photo: String,
}

/// Claims of the signed session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
}

/// POST /user: create an account and mint its bearer `uid`.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !req.email.contains('@') {
        return Err(ApiError::Validation("Email invalide".into()));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("Mot de passe requis".into()));
    }

    let token = uid::mint(
        &req.first_name,
        &req.last_name,
        &req.city_name,
        req.password.chars().count(),
    );
    let password_hash = hash_password(req.password.clone()).await?;
    let photo = state.default_photo.clone();

    let created = with_db(&state, move |db| {
        let Some(id) = db.create_user(&NewUser {
            last_name: &req.last_name,
            first_name: &req.first_name,
            email: &req.email,
            address: &req.address,
            phone: &req.phone,
            city_name: &req.city_name,
            password_hash: &password_hash,
            uid: &token,
            photo: &photo,
        })?
        else {
            return Ok(None);
        };
        db.get_user_by_id(id)
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("Email déjà existant".into()))?;

    info!("User {} created", created.id);

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(
            "Création utilisateur ok",
            RecordPayload {
                record: created.private_profile(),
            },
        )),
    ))
}

/// POST /user/login: check the password and return the profile together
/// with a short-lived session token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.clone();
    let user = with_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(|| ApiError::NotFound("Utilisateur non trouvé".into()))?;

    if !verify_password(req.password, user.password.clone()).await? {
        return Err(ApiError::Unauthorized("Mot de passe incorrect".into()));
    }

    let session = create_session_token(&state.jwt_secret, user.id)
        .map_err(ApiError::internal("Erreur lors de la connexion"))?;

    Ok(Json(Envelope::ok(
        "Connexion réussie",
        LoginPayload {
            user: user.private_profile(),
            session,
        },
    )))
}

/// Argon2id hash in PHC format. Runs on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
    .map_err(ApiError::from)
}

async fn verify_password(password: String, stored: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored)
            .map_err(|e| anyhow::anyhow!("corrupt password hash: {}", e))?;
        Ok::<_, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
    .map_err(ApiError::from)
}

pub fn create_session_token(secret: &str, user_id: i64) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + chrono::Duration::hours(SESSION_HOURS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// User id from a valid, unexpired session token; `None` for anything else.
pub fn decode_session_token(secret: &str, token: &str) -> Option<i64> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}
