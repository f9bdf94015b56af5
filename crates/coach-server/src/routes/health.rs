use axum::extract::State;
use axum::Json;
use coach_core::store::schema::SCHEMA_VERSION;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "tenant": app.config.tenant.name,
        "schema_version": SCHEMA_VERSION,
        "chat_enabled": app.chat.is_some(),
    }))
}

/// GET /api/config: the loaded configuration with its warnings.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let config = serde_json::to_value(app.config.as_ref())?;
    Ok(Json(serde_json::json!({
        "config": config,
        "warnings": app.config.validate(),
    })))
}
