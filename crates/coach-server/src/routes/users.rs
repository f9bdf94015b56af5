use axum::extract::{Path, State};
use axum::Json;
use coach_core::store::NewUser;

use super::blocking;
use crate::error::AppError;
use crate::state::{AppState, RequestActor};

/// GET /api/users
pub async fn list_users(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let users = blocking(move || store.list_users(&actor)).await?;
    Ok(Json(serde_json::json!(users)))
}

/// POST /api/users: create or update a user.
pub async fn upsert_user(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(user): Json<NewUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let user = blocking(move || store.upsert_user(&actor, user)).await?;
    Ok(Json(serde_json::json!(user)))
}

/// GET /api/users/{id}/assignments
pub async fn user_assignments(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let list = blocking(move || {
        store.get_user(&actor, &id)?;
        store.user_assignments(&actor, &id)
    })
    .await?;
    Ok(Json(serde_json::json!(list)))
}
