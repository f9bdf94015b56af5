use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use super::blocking;
use crate::error::AppError;
use crate::state::{AppState, RequestActor};

#[derive(Debug, Deserialize)]
pub struct LessonBody {
    title: String,
    #[serde(default)]
    description: String,
}

/// GET /api/lessons
pub async fn list_lessons(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let lessons = blocking(move || store.list_lessons(&actor)).await?;
    Ok(Json(serde_json::json!(lessons)))
}

/// POST /api/lessons
pub async fn create_lesson(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(body): Json<LessonBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let lesson = blocking(move || store.create_lesson(&actor, &body.title, &body.description)).await?;
    Ok(Json(serde_json::json!(lesson)))
}

/// GET /api/lessons/{id}/tactics
pub async fn list_tactics(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let tactics = blocking(move || store.list_tactics(&actor, &id)).await?;
    Ok(Json(serde_json::json!(tactics)))
}

/// POST /api/lessons/{id}/tactics
pub async fn add_tactic(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(body): Json<LessonBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let tactic =
        blocking(move || store.add_tactic(&actor, &id, &body.title, &body.description)).await?;
    Ok(Json(serde_json::json!(tactic)))
}

#[derive(Debug, Deserialize)]
pub struct TacticOrderBody {
    tactic_ids: Vec<String>,
}

/// PUT /api/lessons/{id}/tactics/order: persist a full ordering. Every
/// tactic of the lesson must appear exactly once.
pub async fn set_tactic_order(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(body): Json<TacticOrderBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let tactics = blocking(move || {
        store.persist_tactic_order(&actor, &id, &body.tactic_ids)?;
        store.list_tactics(&actor, &id)
    })
    .await?;
    Ok(Json(serde_json::json!(tactics)))
}

#[derive(Debug, Deserialize)]
pub struct MoveTacticBody {
    from: usize,
    to: usize,
}

/// POST /api/lessons/{id}/tactics/move: move one tactic by index. On a
/// failed write the stored order is unchanged.
pub async fn move_tactic(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(body): Json<MoveTacticBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let tactics = blocking(move || store.reorder_tactics(&actor, &id, body.from, body.to)).await?;
    Ok(Json(serde_json::json!(tactics)))
}
