use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coach_agent::AgentError;
use coach_core::CoachError;

/// Carries an explicit status through the `anyhow::Error` chain for
/// failures that have no `CoachError` variant.
#[derive(Debug)]
struct StatusError(StatusCode, String);

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.1)
    }
}

impl std::error::Error for StatusError {}

/// Error type for every handler. The body is always `{"error": "..."}`;
/// validation errors also carry `field`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusError(StatusCode::BAD_REQUEST, msg.into()).into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self(StatusError(StatusCode::SERVICE_UNAVAILABLE, msg.into()).into())
    }

    fn status(&self) -> StatusCode {
        if let Some(s) = self.0.downcast_ref::<StatusError>() {
            return s.0;
        }
        if let Some(e) = self.0.downcast_ref::<CoachError>() {
            return match e {
                CoachError::ProtocolNotFound(_)
                | CoachError::AssignmentNotFound(_)
                | CoachError::GroupNotFound(_)
                | CoachError::UserNotFound(_)
                | CoachError::LessonNotFound(_)
                | CoachError::TacticNotFound(_) => StatusCode::NOT_FOUND,
                CoachError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                CoachError::AssignmentConflict { .. } | CoachError::ProtocolInUse { .. } => {
                    StatusCode::CONFLICT
                }
                CoachError::InvalidEnum { .. } | CoachError::NotInitialized => {
                    StatusCode::BAD_REQUEST
                }
                CoachError::Load(_)
                | CoachError::Db(_)
                | CoachError::Io(_)
                | CoachError::Yaml(_)
                | CoachError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        if self.0.downcast_ref::<AgentError>().is_some() {
            return StatusCode::BAD_GATEWAY;
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {:#}", self.0);
        }
        let mut body = serde_json::json!({ "error": self.0.to_string() });
        if let Some(CoachError::Validation { field, message }) = self.0.downcast_ref::<CoachError>() {
            body["field"] = serde_json::json!(field);
            body["message"] = serde_json::json!(message);
        }
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
