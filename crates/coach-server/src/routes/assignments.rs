use axum::extract::{Path, Query, State};
use axum::Json;
use coach_core::store::AssignRequest;
use coach_core::types::AssignmentStatus;
use serde::Deserialize;

use super::blocking;
use crate::error::AppError;
use crate::state::{AppState, RequestActor};

#[derive(Debug, Default, Deserialize)]
pub struct AssignedQuery {
    #[serde(default)]
    include_inactive: bool,
}

/// GET /api/protocols/{id}/assignments: learners with their progress.
pub async fn list_assigned(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Query(query): Query<AssignedQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let users = blocking(move || store.list_assigned_users(&actor, &id, query.include_inactive)).await?;
    Ok(Json(serde_json::json!(users)))
}

/// POST /api/protocols/{id}/assignments: bulk assign. Unresolved
/// conflicts without `override` answer 409 and assign nobody.
pub async fn assign(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let outcome = blocking(move || store.assign_protocol(&actor, &id, &request)).await?;
    Ok(Json(serde_json::json!(outcome)))
}

/// POST /api/assignments/{id}/abandon
pub async fn abandon(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let assignment = blocking(move || store.abandon_assignment(&actor, &id)).await?;
    Ok(Json(serde_json::json!(assignment)))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    status: AssignmentStatus,
}

/// PUT /api/assignments/{id}/status: pause, resume or close an assignment.
pub async fn set_status(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let assignment = blocking(move || store.set_assignment_status(&actor, &id, body.status)).await?;
    Ok(Json(serde_json::json!(assignment)))
}

#[derive(Debug, Deserialize)]
pub struct ProgressBody {
    current_week: u32,
    current_day: u32,
}

/// PUT /api/assignments/{id}/progress
pub async fn update_progress(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(body): Json<ProgressBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let assignment = blocking(move || {
        store.update_progress(&actor, &id, body.current_week, body.current_day)
    })
    .await?;
    Ok(Json(serde_json::json!(assignment)))
}
