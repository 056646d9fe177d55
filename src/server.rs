//! JSON HTTP API.
//!
//! Exposes submissions, feeds, neighbor search, and username management
//! over axum. Every handler goes through the shared [`Cosine`] handle; the
//! acting user is resolved per request by the configured [`Authenticator`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/texts/recent` | Recent-activity feed (`?cursor=&limit=`) |
//! | `POST` | `/texts` | Submit `{ "text", "notes"? }` |
//! | `GET`  | `/texts/random` | Hash of a random annotated text |
//! | `GET`  | `/texts/{hash}` | Text with its active annotations |
//! | `GET`  | `/texts/{hash}/neighbors` | Nearest texts (`?offset=&limit=`) |
//! | `POST` | `/texts/{hash}/pin` | Toggle the caller's pin |
//! | `POST` | `/texts/{hash}/delete` | Soft-delete the caller's annotation |
//! | `GET`  | `/users/{username}/texts` | Texts the user annotated |
//! | `GET`  | `/users/{username}/pinned` | Texts the user pinned |
//! | `GET`  | `/usernames/{username}/availability` | Username check |
//! | `PUT`  | `/me/username` | Claim `{ "username" }` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "text 3f2a... not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `empty_corpus` (404), `embedding_error` (502), `internal` (500).

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use cosine_core::models::{
    ContentDetail, DeleteReceipt, NeighborPage, PinState, Submission, TimelinePage, User,
};
use cosine_core::users::Availability;
use cosine_core::{Actor, CosineError};

use crate::auth::{AnonymousOnly, Authenticator, TokenAuthenticator};
use crate::config::Config;
use crate::service::Cosine;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cosine: Cosine,
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    pub fn new(cosine: Cosine, auth: Arc<dyn Authenticator>) -> Self {
        Self { cosine, auth }
    }

    fn actor(&self, headers: &HeaderMap) -> Result<Actor, AppError> {
        Ok(self.auth.authenticate(headers)?)
    }
}

/// Build the router. Split out from [`run_server`] so tests can drive it
/// without binding a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/texts", post(handle_submit))
        .route("/texts/recent", get(handle_recent))
        .route("/texts/random", get(handle_random))
        .route("/texts/{hash}", get(handle_detail))
        .route("/texts/{hash}/neighbors", get(handle_neighbors))
        .route("/texts/{hash}/pin", post(handle_pin))
        .route("/texts/{hash}/delete", post(handle_delete))
        .route("/users/{username}/texts", get(handle_user_texts))
        .route("/users/{username}/pinned", get(handle_user_pinned))
        .route(
            "/usernames/{username}/availability",
            get(handle_availability),
        )
        .route("/me/username", put(handle_set_username))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `[server].bind` and run until the process is
/// terminated.
///
/// Bearer tokens are accepted when the secret named by `[auth].secret_env`
/// is set; otherwise every request is anonymous.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let cosine = Cosine::init(config).await?;

    let auth: Arc<dyn Authenticator> = match TokenAuthenticator::from_config(&config.auth) {
        Ok(auth) => Arc::new(auth),
        Err(e) => {
            tracing::warn!(error = %e, "bearer tokens disabled; serving anonymous requests only");
            Arc::new(AnonymousOnly)
        }
    };

    let app = router(AppState::new(cosine, auth));

    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    println!("Cosine listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// A [`CosineError`] on its way out as an HTTP response.
pub struct AppError(CosineError);

impl From<CosineError> for AppError {
    fn from(err: CosineError) -> Self {
        AppError(err)
    }
}

fn status_for(err: &CosineError) -> StatusCode {
    match err {
        CosineError::NotFound(_) | CosineError::EmptyCorpus => StatusCode::NOT_FOUND,
        CosineError::Unauthorized => StatusCode::UNAUTHORIZED,
        CosineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CosineError::EmbeddingProvider(_) => StatusCode::BAD_GATEWAY,
        CosineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match &self.0 {
            CosineError::Store(e) => {
                tracing::error!(error = %format!("{:#}", e), "request failed");
                "internal error".to_string()
            }
            CosineError::EmbeddingProvider(e) => {
                tracing::warn!(error = %format!("{:#}", e), "embedding provider failed");
                self.0.to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.0.code(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Default, Deserialize)]
struct FeedQuery {
    cursor: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct NeighborQuery {
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    text: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsernameRequest {
    username: String,
}

#[derive(Serialize)]
struct RandomResponse {
    hash: String,
}

async fn handle_recent(
    State(state): State<AppState>,
    Query(q): Query<FeedQuery>,
) -> Result<Json<TimelinePage>, AppError> {
    let page = state.cosine.recent(q.cursor.as_deref(), q.limit).await?;
    Ok(Json(page))
}

async fn handle_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    let actor = state.actor(&headers)?;
    let submission = state
        .cosine
        .submit(&actor, &req.text, req.notes.as_deref())
        .await?;
    let status = if submission.created_content {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(submission)))
}

async fn handle_random(State(state): State<AppState>) -> Result<Json<RandomResponse>, AppError> {
    let hash = state.cosine.random().await?;
    Ok(Json(RandomResponse { hash }))
}

async fn handle_detail(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<ContentDetail>, AppError> {
    Ok(Json(state.cosine.detail(&hash).await?))
}

async fn handle_neighbors(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Query(q): Query<NeighborQuery>,
) -> Result<Json<NeighborPage>, AppError> {
    let page = state.cosine.neighbors(&hash, q.offset, q.limit).await?;
    Ok(Json(page))
}

async fn handle_pin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> Result<Json<PinState>, AppError> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.cosine.toggle_pin(&actor, &hash).await?))
}

async fn handle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> Result<Json<DeleteReceipt>, AppError> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.cosine.delete(&actor, &hash).await?))
}

async fn handle_user_texts(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(q): Query<FeedQuery>,
) -> Result<Json<TimelinePage>, AppError> {
    let page = state
        .cosine
        .authored_by(&username, q.cursor.as_deref(), q.limit)
        .await?;
    Ok(Json(page))
}

async fn handle_user_pinned(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(q): Query<FeedQuery>,
) -> Result<Json<TimelinePage>, AppError> {
    let page = state
        .cosine
        .pinned_by(&username, q.cursor.as_deref(), q.limit)
        .await?;
    Ok(Json(page))
}

async fn handle_availability(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Availability>, AppError> {
    Ok(Json(state.cosine.check_username(&username).await?))
}

async fn handle_set_username(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UsernameRequest>,
) -> Result<Json<User>, AppError> {
    let actor = state.actor(&headers)?;
    Ok(Json(state.cosine.set_username(&actor, &req.username).await?))
}
