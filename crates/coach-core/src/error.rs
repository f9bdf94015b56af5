use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoachError {
    #[error("not initialized: run 'coach init'")]
    NotInitialized,

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{count} selected user(s) already have an active protocol in this slot; override required")]
    AssignmentConflict { count: usize },

    #[error("protocol {id} has {assignments} assignment(s) and cannot be deleted")]
    ProtocolInUse { id: String, assignments: u32 },

    #[error("protocol not found: {0}")]
    ProtocolNotFound(String),

    #[error("assignment not found: {0}")]
    AssignmentNotFound(String),

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("lesson not found: {0}")]
    LessonNotFound(String),

    #[error("tactic not found: {0}")]
    TacticNotFound(String),

    #[error("invalid {kind}: '{value}'")]
    InvalidEnum { kind: &'static str, value: String },

    #[error("failed to load protocol tasks: {0}")]
    Load(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CoachError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoachError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_enum(kind: &'static str, value: impl Into<String>) -> Self {
        CoachError::InvalidEnum {
            kind,
            value: value.into(),
        }
    }

    /// True for errors the operator can fix by changing their input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            CoachError::Validation { .. }
                | CoachError::AssignmentConflict { .. }
                | CoachError::ProtocolInUse { .. }
                | CoachError::InvalidEnum { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoachError>;
