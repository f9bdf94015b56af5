use crate::error::CoachError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TaskType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Action,
    Reflection,
    Reading,
    Video,
    Worksheet,
    VoiceRecording,
}

impl TaskType {
    pub fn all() -> &'static [TaskType] {
        &[
            TaskType::Action,
            TaskType::Reflection,
            TaskType::Reading,
            TaskType::Video,
            TaskType::Worksheet,
            TaskType::VoiceRecording,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Action => "action",
            TaskType::Reflection => "reflection",
            TaskType::Reading => "reading",
            TaskType::Video => "video",
            TaskType::Worksheet => "worksheet",
            TaskType::VoiceRecording => "voice_recording",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoachError::invalid_enum("task type", s))
    }
}

// ---------------------------------------------------------------------------
// TimeOfDay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    #[default]
    Morning,
    Throughout,
    Evening,
}

impl TimeOfDay {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Throughout => "throughout",
            TimeOfDay::Evening => "evening",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(TimeOfDay::Morning),
            "throughout" => Ok(TimeOfDay::Throughout),
            "evening" => Ok(TimeOfDay::Evening),
            _ => Err(CoachError::invalid_enum("time of day", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// ScheduleType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    #[default]
    Immediate,
    DateSpecific,
    Rolling,
}

impl ScheduleType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleType::Immediate => "immediate",
            ScheduleType::DateSpecific => "date_specific",
            ScheduleType::Rolling => "rolling",
        }
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduleType {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(ScheduleType::Immediate),
            "date_specific" | "date-specific" => Ok(ScheduleType::DateSpecific),
            "rolling" => Ok(ScheduleType::Rolling),
            _ => Err(CoachError::invalid_enum("schedule type", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// VisibilityMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityMode {
    AllUsers,
    TierBased,
    Individual,
    CustomGroup,
}

impl VisibilityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            VisibilityMode::AllUsers => "all_users",
            VisibilityMode::TierBased => "tier_based",
            VisibilityMode::Individual => "individual",
            VisibilityMode::CustomGroup => "custom_group",
        }
    }
}

impl fmt::Display for VisibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VisibilityMode {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_users" => Ok(VisibilityMode::AllUsers),
            "tier_based" => Ok(VisibilityMode::TierBased),
            "individual" => Ok(VisibilityMode::Individual),
            "custom_group" => Ok(VisibilityMode::CustomGroup),
            _ => Err(CoachError::invalid_enum("visibility mode", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Premium,
    Admin,
    Owner,
    SuperAdmin,
}

impl Tier {
    pub fn all() -> &'static [Tier] {
        &[
            Tier::Free,
            Tier::Basic,
            Tier::Premium,
            Tier::Admin,
            Tier::Owner,
            Tier::SuperAdmin,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Premium => "premium",
            Tier::Admin => "admin",
            Tier::Owner => "owner",
            Tier::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoachError::invalid_enum("tier", s))
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// One of the two parallel tracks a learner can run protocols in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    #[default]
    Primary,
    Secondary,
}

impl Slot {
    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Primary => "primary",
            Slot::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Slot {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Slot::Primary),
            "secondary" => Ok(Slot::Secondary),
            _ => Err(CoachError::invalid_enum("slot", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// AssignmentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Paused,
    Completed,
    Abandoned,
    Expired,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Active => "active",
            AssignmentStatus::Paused => "paused",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Abandoned => "abandoned",
            AssignmentStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AssignmentStatus::Completed | AssignmentStatus::Abandoned | AssignmentStatus::Expired
        )
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AssignmentStatus::Active),
            "paused" => Ok(AssignmentStatus::Paused),
            "completed" => Ok(AssignmentStatus::Completed),
            "abandoned" => Ok(AssignmentStatus::Abandoned),
            "expired" => Ok(AssignmentStatus::Expired),
            _ => Err(CoachError::invalid_enum("assignment status", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Identity of the operator performing an action and the product they act in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub product_id: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            product_id: product_id.into(),
        }
    }
}
