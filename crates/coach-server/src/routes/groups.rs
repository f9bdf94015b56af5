use axum::extract::{Path, State};
use axum::Json;
use coach_core::types::Actor;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::blocking;
use crate::error::AppError;
use crate::state::{AppState, RequestActor};

/// Mirror a committed group change to the function boundary. `None` when no
/// functions endpoint is configured. A failed call is logged and reported as
/// `Some(false)`; the local change stands and the caller may retry the sync.
async fn mirror(app: &AppState, actor: &Actor, action: &str, mut data: Value) -> Option<bool> {
    let functions = app.functions.as_ref()?;
    data["product_id"] = json!(actor.product_id);
    data["actor"] = json!(actor.user_id);
    match functions.invoke(action, data).await {
        Ok(_) => Some(true),
        Err(e) => {
            warn!(action, error = %e, "group change not mirrored");
            Some(false)
        }
    }
}

/// GET /api/groups
pub async fn list_groups(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let groups = blocking(move || store.list_groups(&actor)).await?;
    Ok(Json(json!(groups)))
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupBody {
    name: String,
    #[serde(default)]
    description: String,
}

/// POST /api/groups
pub async fn create_group(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(body): Json<CreateGroupBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let creator = actor.clone();
    let group = blocking(move || store.create_group(&creator, &body.name, &body.description)).await?;
    let synced = mirror(
        &app,
        &actor,
        "create_group",
        json!({ "group_id": group.id, "name": group.name, "description": group.description }),
    )
    .await;
    let mut out = json!(group);
    out["synced"] = json!(synced);
    Ok(Json(out))
}

/// GET /api/groups/{id}/members
pub async fn list_members(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let members = blocking(move || store.group_members_for(&actor, &id)).await?;
    Ok(Json(json!(members)))
}

#[derive(Debug, Deserialize)]
pub struct MemberBody {
    user_id: String,
}

/// POST /api/groups/{id}/members
pub async fn add_member(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(body): Json<MemberBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let (writer, group_id, user_id) = (actor.clone(), id.clone(), body.user_id.clone());
    let added = blocking(move || store.add_group_member(&writer, &group_id, &user_id)).await?;
    let synced = if added {
        mirror(&app, &actor, "add_group_member", json!({ "group_id": id, "user_id": body.user_id })).await
    } else {
        None
    };
    Ok(Json(json!({ "added": added, "synced": synced })))
}

/// DELETE /api/groups/{id}/members/{user_id}
pub async fn remove_member(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let (writer, group_id, member) = (actor.clone(), id.clone(), user_id.clone());
    let removed = blocking(move || store.remove_group_member(&writer, &group_id, &member)).await?;
    let synced = if removed {
        mirror(&app, &actor, "remove_group_member", json!({ "group_id": id, "user_id": user_id })).await
    } else {
        None
    };
    Ok(Json(json!({ "removed": removed, "synced": synced })))
}
