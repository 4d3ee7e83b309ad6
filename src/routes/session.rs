use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::session::{CreateSessionRequest, SessionDetail, SessionSummary},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes handling session creation and lookup.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
}

/// Create a fresh session with its palette teams.
#[utoipa::path(
    post,
    path = "/api/sessions",
    tag = "session",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionSummary)
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionSummary>), AppError> {
    let summary = session_service::create_session(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Fetch a session and its teams by shareable code.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    tag = "session",
    params(("id" = String, Path, description = "Shareable code of the session")),
    responses(
        (status = 200, description = "Session found", body = SessionDetail),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetail>, AppError> {
    let detail = session_service::session_detail(&state, &id).await?;
    Ok(Json(detail))
}
