use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use coach_core::assignment::{can_assign, conflict_summary};
use coach_core::import::{self, Format, ProtocolDocument};
use coach_core::protocol::Protocol;
use coach_core::types::Slot;
use coach_core::visibility::{collect_targets, Targets};
use serde::Deserialize;

use super::{blocking, today};
use crate::error::AppError;
use crate::state::{AppState, RequestActor};

fn detail(protocol: &Protocol) -> serde_json::Value {
    serde_json::json!({
        "id": protocol.id,
        "protocol": protocol,
        "stats": protocol.stats(),
    })
}

/// GET /api/protocols
pub async fn list_protocols(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let list = blocking(move || store.list_protocols(&actor)).await?;
    Ok(Json(serde_json::json!(list)))
}

/// POST /api/protocols: create from the nested editing shape. Any `id` in
/// the body is ignored.
pub async fn create_protocol(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(mut protocol): Json<Protocol>,
) -> Result<Json<serde_json::Value>, AppError> {
    protocol.id = None;
    let store = app.store.clone();
    let saved = blocking(move || {
        store.save_protocol(&actor, &mut protocol, today())?;
        Ok(protocol)
    })
    .await?;
    Ok(Json(detail(&saved)))
}

/// POST /api/protocols/import: create from a protocol document.
pub async fn import_protocol(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(doc): Json<ProtocolDocument>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let saved = blocking(move || {
        let mut protocol = doc.into_protocol()?;
        store.save_protocol(&actor, &mut protocol, today())?;
        Ok(protocol)
    })
    .await?;
    Ok(Json(detail(&saved)))
}

/// GET /api/protocols/{id}
pub async fn get_protocol(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let protocol = blocking(move || store.load_protocol(&actor, &id)).await?;
    Ok(Json(detail(&protocol)))
}

/// PUT /api/protocols/{id}
pub async fn update_protocol(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(mut protocol): Json<Protocol>,
) -> Result<Json<serde_json::Value>, AppError> {
    protocol.id = Some(id);
    let store = app.store.clone();
    let saved = blocking(move || {
        store.save_protocol(&actor, &mut protocol, today())?;
        Ok(protocol)
    })
    .await?;
    Ok(Json(detail(&saved)))
}

/// DELETE /api/protocols/{id}
pub async fn delete_protocol(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let deleted = id.clone();
    blocking(move || store.delete_protocol(&actor, &id)).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    format: Option<String>,
}

/// GET /api/protocols/{id}/export?format=yaml|json
pub async fn export_protocol(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let format = match query.format.as_deref() {
        None | Some("json") => Format::Json,
        Some("yaml") | Some("yml") => Format::Yaml,
        Some(other) => return Err(AppError::bad_request(format!("unknown export format '{other}'"))),
    };
    let store = app.store.clone();
    let doc = blocking(move || {
        let protocol = store.load_protocol(&actor, &id)?;
        Ok(ProtocolDocument::from_protocol(&protocol))
    })
    .await?;
    match format {
        Format::Json => Ok(Json(doc).into_response()),
        Format::Yaml => {
            let text = import::render(&doc, Format::Yaml)?;
            Ok(([(header::CONTENT_TYPE, "application/yaml")], text).into_response())
        }
    }
}

/// GET /api/protocols/{id}/audience: who the protocol's visibility selects.
/// Tier audiences are expanded to user ids; all_users stays unbounded.
pub async fn get_audience(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = blocking(move || {
        let protocol = store.load_protocol(&actor, &id)?;
        let targets = protocol.visibility.resolve_targets(&store.members_lookup(&actor))?;
        let user_ids = match &targets {
            Targets::Unbounded => None,
            Targets::ByTier { tiers } => Some(store.users_in_tiers(&actor, tiers)?),
            Targets::Users { user_ids } => Some(user_ids.clone()),
        };
        Ok(serde_json::json!({
            "visibility": protocol.visibility,
            "targets": targets,
            "user_ids": user_ids,
        }))
    })
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckBody {
    #[serde(default)]
    user_ids: Vec<String>,
    #[serde(default)]
    group_ids: Vec<String>,
    #[serde(default)]
    slot: Slot,
}

/// POST /api/protocols/{id}/conflicts
pub async fn check_conflicts(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(body): Json<ConflictCheckBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = blocking(move || {
        store.load_protocol(&actor, &id)?;
        let targets = collect_targets(&store.members_lookup(&actor), &body.user_ids, &body.group_ids)?;
        let conflicts = store.check_conflicts(&actor, &targets, body.slot)?;
        Ok(serde_json::json!({
            "slot": body.slot,
            "total_selected": targets.len(),
            "summary": conflict_summary(&conflicts),
            "can_assign_without_override": can_assign(targets.len(), conflicts.len(), false),
            "conflicts": conflicts,
        }))
    })
    .await?;
    Ok(Json(result))
}
