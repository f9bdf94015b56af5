//! Assignments, slot conflicts and the check-then-assign flow.
//!
//! A learner may hold at most one *active* assignment per slot. Before new
//! assignment rows are written, the targets are checked for active
//! assignments in the requested slot; any hit is a [`Conflict`] and blocks
//! the assignment until the operator opts into overriding it.
//!
//! [`AssignFlow`] tracks one assignment attempt. Each selection change starts
//! a new check generation and results from older generations are dropped, so
//! a slow response for a previous selection never overwrites the current one.

use crate::error::Result;
use crate::types::{AssignmentStatus, Slot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How many conflicts a summary lists before collapsing into "+N more".
pub const CONFLICT_DISPLAY_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub user_id: String,
    pub protocol_id: String,
    pub slot: Slot,
    pub status: AssignmentStatus,
    pub current_week: Option<u32>,
    pub current_day: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub days_completed: u32,
    pub days_skipped: u32,
    pub assigned_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub user_id: String,
    pub assignment_id: String,
    pub protocol_id: String,
    pub protocol_title: String,
    pub slot: Slot,
    pub status: AssignmentStatus,
}

/// Per-user outcome of a bulk assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignResult {
    pub user_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssignResult {
    pub fn ok(user_id: impl Into<String>, assignment_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            success: true,
            assignment_id: Some(assignment_id.into()),
            error: None,
        }
    }

    pub fn failed(user_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            success: false,
            assignment_id: None,
            error: Some(error.into()),
        }
    }
}

/// Results of a bulk assignment, reported as counts. A failed user never
/// fails the batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<AssignResult>,
    pub success: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn from_results(results: Vec<AssignResult>) -> Self {
        let success = results.iter().filter(|r| r.success).count();
        let failed = results.len() - success;
        Self {
            results,
            success,
            failed,
        }
    }
}

/// Whether an assignment may proceed for the current selection.
pub fn can_assign(total_selected: usize, conflicts: usize, override_conflicts: bool) -> bool {
    total_selected > 0 && (conflicts == 0 || override_conflicts)
}

/// Display text for a conflict list: the first few, then "+N more".
pub fn conflict_summary(conflicts: &[Conflict]) -> Vec<String> {
    let mut lines: Vec<String> = conflicts
        .iter()
        .take(CONFLICT_DISPLAY_LIMIT)
        .map(|c| format!("{} already has '{}' ({})", c.user_id, c.protocol_title, c.slot))
        .collect();
    if conflicts.len() > CONFLICT_DISPLAY_LIMIT {
        lines.push(format!("+{} more", conflicts.len() - CONFLICT_DISPLAY_LIMIT));
    }
    lines
}

// ---------------------------------------------------------------------------
// AssignFlow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    Checking,
    Clean,
    Conflicted,
    ReadyToOverride,
    Assigned,
    Failed { error: String },
}

/// Generation token handed out when a conflict check starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckToken(u64);

#[derive(Debug, Clone)]
pub struct AssignFlow {
    state: FlowState,
    generation: u64,
    slot: Slot,
    selected: Vec<String>,
    conflicts: Vec<Conflict>,
    override_conflicts: bool,
}

impl AssignFlow {
    pub fn new(slot: Slot) -> Self {
        Self {
            state: FlowState::Idle,
            generation: 0,
            slot,
            selected: Vec::new(),
            conflicts: Vec::new(),
            override_conflicts: false,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn is_checking(&self) -> bool {
        self.state == FlowState::Checking
    }

    /// Replace the target selection and start a new check.
    pub fn select(&mut self, user_ids: Vec<String>) -> CheckToken {
        self.selected = user_ids;
        self.restart_check()
    }

    /// Change the slot and start a new check.
    pub fn set_slot(&mut self, slot: Slot) -> CheckToken {
        self.slot = slot;
        self.restart_check()
    }

    /// Start the same check again, e.g. after a failed one.
    pub fn begin_check(&mut self) -> CheckToken {
        self.restart_check()
    }

    fn restart_check(&mut self) -> CheckToken {
        self.generation += 1;
        self.conflicts.clear();
        self.override_conflicts = false;
        self.state = FlowState::Checking;
        CheckToken(self.generation)
    }

    /// Record a check result. Returns `false` and changes nothing when the
    /// token belongs to a superseded check.
    pub fn complete_check(&mut self, token: CheckToken, result: Result<Vec<Conflict>>) -> bool {
        if token.0 != self.generation || self.state != FlowState::Checking {
            return false;
        }
        match result {
            Ok(conflicts) if conflicts.is_empty() => {
                self.state = FlowState::Clean;
            }
            Ok(conflicts) => {
                self.conflicts = conflicts;
                self.state = FlowState::Conflicted;
            }
            Err(e) => {
                self.state = FlowState::Failed {
                    error: e.to_string(),
                };
            }
        }
        true
    }

    pub fn set_override(&mut self, override_conflicts: bool) {
        self.override_conflicts = override_conflicts;
        self.state = match (&self.state, override_conflicts) {
            (FlowState::Conflicted, true) => FlowState::ReadyToOverride,
            (FlowState::ReadyToOverride, false) => FlowState::Conflicted,
            (s, _) => s.clone(),
        };
    }

    pub fn override_conflicts(&self) -> bool {
        self.override_conflicts
    }

    pub fn can_assign(&self) -> bool {
        matches!(
            self.state,
            FlowState::Clean | FlowState::Conflicted | FlowState::ReadyToOverride
        ) && can_assign(
            self.selected.len(),
            self.conflicts.len(),
            self.override_conflicts,
        )
    }

    /// Record the outcome of the assignment call.
    pub fn finish(&mut self, outcome: Result<&BatchOutcome>) {
        self.state = match outcome {
            Ok(_) => FlowState::Assigned,
            Err(e) => FlowState::Failed {
                error: e.to_string(),
            },
        };
    }
}
