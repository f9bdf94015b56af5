use axum::extract::State;
use axum::Json;
use coach_agent::ChatRequest;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::{AppState, RequestActor};

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    message: String,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
}

/// POST /api/chat: forward a message to the coaching workflow as the
/// acting user.
pub async fn send_message(
    State(app): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(body): Json<ChatBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Some(client) = app.chat.as_ref() else {
        return Err(AppError::unavailable("chat webhook is not configured"));
    };
    if body.message.trim().is_empty() {
        return Err(AppError::bad_request("message is required"));
    }
    let mut request = ChatRequest::new(actor.user_id, body.message);
    request.agent = body.agent;
    request.conversation_id = body.conversation_id;
    let reply = client.send(request).await?;
    if reply.handoff_detected {
        tracing::info!(agent = ?reply.agent, "chat handed off");
    }
    Ok(Json(serde_json::json!(reply)))
}
