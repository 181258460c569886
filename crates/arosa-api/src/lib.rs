pub mod auth;
pub mod conversations;
pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod posts;
pub mod species;
pub mod storage;
pub mod uid;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
};
use tower_http::services::ServeDir;

use arosa_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_auth;

/// Three images plus form fields.
const MAX_POST_BODY: usize = 32 * 1024 * 1024;

/// Builds every route. Cross-cutting layers (CORS, tracing) are added by the
/// binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/user", post(auth::register).get(users::list_users))
        .route("/user/login", post(auth::login))
        .route("/user/{id}", get(users::get_user))
        .route("/post", get(posts::list_posts))
        .route("/post/{id}", get(posts::get_post))
        .route("/post/user/{id}", get(posts::list_user_posts))
        .route("/species", get(species::search_species))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/user", put(users::update_user))
        .route("/user/me", get(users::me))
        .route("/user/{id}", delete(users::delete_user))
        .route("/user/{id}/botanist", patch(users::set_botanist))
        .route(
            "/post",
            post(posts::create_post).layer(DefaultBodyLimit::max(MAX_POST_BODY)),
        )
        .route("/post/{id}", delete(posts::delete_post))
        .route("/post/{id}/visibility", patch(posts::toggle_visibility))
        .route("/post/{id}/accept", patch(posts::accept_post))
        .route(
            "/conversation",
            post(conversations::create_conversation).get(conversations::list_conversations),
        )
        .route("/conversation/mine", get(conversations::list_my_conversations))
        .route("/conversation/{id}", delete(conversations::delete_conversation))
        .route(
            "/conversation/{id}/messages",
            post(messages::send_message).get(messages::list_messages),
        )
        .layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/media", ServeDir::new(state.media.dir()))
}

async fn health() -> &'static str {
    "ok"
}

/// Runs a blocking database closure off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
        .map_err(ApiError::from)
}
