//! Assignment rows: conflict checks, bulk assignment, progress and status.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{groups, new_id, now, opt_ts_col, parse_col, placeholders, protocols, ts_col, Store};
use crate::assignment::{can_assign, AssignResult, Assignment, BatchOutcome, Conflict};
use crate::error::{CoachError, Result};
use crate::progress::{days_elapsed, progress_percent};
use crate::protocol::DAYS_PER_WEEK;
use crate::types::{Actor, AssignmentStatus, Slot};
use crate::visibility::collect_targets;

/// Who to assign, where, and whether existing assignments may be replaced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignRequest {
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub slot: Slot,
    #[serde(default, alias = "override")]
    pub override_conflicts: bool,
}

/// A learner on a protocol, with their progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedUser {
    pub assignment_id: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub slot: Slot,
    pub status: AssignmentStatus,
    pub current_week: Option<u32>,
    pub current_day: Option<u32>,
    pub progress_percent: u8,
    pub days_completed: u32,
    pub days_skipped: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

const ASSIGNMENT_COLUMNS: &str = "id, user_id, protocol_id, assignment_slot, status, current_week,
    current_day, started_at, completed_at, days_completed, days_skipped, assigned_by";

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        protocol_id: row.get(2)?,
        slot: parse_col(row, 3)?,
        status: parse_col(row, 4)?,
        current_week: row.get(5)?,
        current_day: row.get(6)?,
        started_at: ts_col(row, 7)?,
        completed_at: opt_ts_col(row, 8)?,
        days_completed: row.get(9)?,
        days_skipped: row.get(10)?,
        assigned_by: row.get(11)?,
    })
}

impl Store {
    /// Active assignments in `slot` held by any of `user_ids`.
    pub fn check_conflicts(&self, actor: &Actor, user_ids: &[String], slot: Slot) -> Result<Vec<Conflict>> {
        let conn = self.lock();
        conflicts(&conn, &actor.product_id, user_ids, slot)
    }

    /// Assign a protocol to users and group members.
    ///
    /// Targets are deduplicated first. Without `override_conflicts`, any
    /// active assignment in the slot rejects the whole request with
    /// [`CoachError::AssignmentConflict`] and writes nothing. Otherwise each
    /// user is handled in its own transaction: prior active assignments in
    /// the slot are abandoned and the new one inserted together. A failure
    /// for one user is reported in the outcome and does not stop the rest.
    pub fn assign_protocol(
        &self,
        actor: &Actor,
        protocol_id: &str,
        request: &AssignRequest,
    ) -> Result<BatchOutcome> {
        let mut conn = self.lock();
        protocols::header(&conn, &actor.product_id, protocol_id)?;

        let lookup = groups::ConnLookup {
            conn: &*conn,
            product_id: &actor.product_id,
        };
        let targets = collect_targets(&lookup, &request.user_ids, &request.group_ids)?;

        let found = conflicts(&conn, &actor.product_id, &targets, request.slot)?;
        if !can_assign(targets.len(), found.len(), request.override_conflicts) {
            if targets.is_empty() {
                return Err(CoachError::validation("targets", "select at least one user"));
            }
            return Err(CoachError::AssignmentConflict { count: found.len() });
        }

        let mut results = Vec::with_capacity(targets.len());
        for user_id in &targets {
            match assign_one(&mut conn, actor, protocol_id, user_id, request) {
                Ok(assignment_id) => results.push(AssignResult::ok(user_id, assignment_id)),
                Err(e) => {
                    warn!(user = %user_id, protocol = %protocol_id, "assignment failed: {e}");
                    results.push(AssignResult::failed(user_id, e.to_string()));
                }
            }
        }
        let outcome = BatchOutcome::from_results(results);
        info!(
            protocol = %protocol_id,
            slot = %request.slot,
            success = outcome.success,
            failed = outcome.failed,
            overridden = found.len(),
            "assignment batch finished"
        );
        Ok(outcome)
    }

    pub fn get_assignment(&self, actor: &Actor, assignment_id: &str) -> Result<Assignment> {
        let conn = self.lock();
        get(&conn, &actor.product_id, assignment_id)
    }

    /// Every assignment a user holds, newest first.
    pub fn user_assignments(&self, actor: &Actor, user_id: &str) -> Result<Vec<Assignment>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
             WHERE product_id = ?1 AND user_id = ?2 ORDER BY started_at DESC"
        ))?;
        let rows = stmt.query_map(params![actor.product_id, user_id], assignment_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn abandon_assignment(&self, actor: &Actor, assignment_id: &str) -> Result<Assignment> {
        self.set_assignment_status(actor, assignment_id, AssignmentStatus::Abandoned)
    }

    /// Move an assignment to `status`. Terminal assignments never change, and
    /// resuming a paused assignment is refused while another one is active in
    /// the same slot.
    pub fn set_assignment_status(
        &self,
        actor: &Actor,
        assignment_id: &str,
        status: AssignmentStatus,
    ) -> Result<Assignment> {
        let conn = self.lock();
        let current = get(&conn, &actor.product_id, assignment_id)?;
        if current.status == status {
            return Ok(current);
        }
        if current.status.is_terminal() {
            return Err(CoachError::validation(
                "status",
                format!("assignment is already {}", current.status),
            ));
        }
        if status == AssignmentStatus::Active {
            let others = conflicts(
                &conn,
                &actor.product_id,
                std::slice::from_ref(&current.user_id),
                current.slot,
            )?;
            if !others.is_empty() {
                return Err(CoachError::AssignmentConflict { count: others.len() });
            }
        }
        let completed_at = status.is_terminal().then(now);
        conn.execute(
            "UPDATE assignments SET status = ?1, completed_at = ?2 WHERE id = ?3",
            params![status.as_str(), completed_at, assignment_id],
        )?;
        info!(assignment = %assignment_id, from = %current.status, to = %status, "assignment status changed");
        get(&conn, &actor.product_id, assignment_id)
    }

    /// Record the learner's cursor. Reaching the last day of the last week
    /// completes the assignment.
    pub fn update_progress(
        &self,
        actor: &Actor,
        assignment_id: &str,
        week: u32,
        day: u32,
    ) -> Result<Assignment> {
        let conn = self.lock();
        let current = get(&conn, &actor.product_id, assignment_id)?;
        if current.status != AssignmentStatus::Active {
            return Err(CoachError::validation(
                "status",
                format!("progress can only be recorded on an active assignment, not {}", current.status),
            ));
        }
        let (_, total_weeks) = protocols::header(&conn, &actor.product_id, &current.protocol_id)?;
        if week == 0 || week > total_weeks {
            return Err(CoachError::validation(
                "week",
                format!("week must be 1..{total_weeks}, got {week}"),
            ));
        }
        if day == 0 || day > DAYS_PER_WEEK {
            return Err(CoachError::validation(
                "day",
                format!("day must be 1..{DAYS_PER_WEEK}, got {day}"),
            ));
        }

        let days_completed = days_elapsed(week, day).saturating_sub(current.days_skipped);
        let finished = week == total_weeks && day == DAYS_PER_WEEK;
        let (status, completed_at) = if finished {
            (AssignmentStatus::Completed, Some(now()))
        } else {
            (AssignmentStatus::Active, None)
        };
        conn.execute(
            "UPDATE assignments SET current_week = ?1, current_day = ?2, days_completed = ?3,
                status = ?4, completed_at = ?5
             WHERE id = ?6",
            params![week, day, days_completed, status.as_str(), completed_at, assignment_id],
        )?;
        if finished {
            info!(assignment = %assignment_id, "assignment completed");
        }
        get(&conn, &actor.product_id, assignment_id)
    }

    /// Learners on a protocol with their progress. Inactive assignments are
    /// included only when asked for.
    pub fn list_assigned_users(
        &self,
        actor: &Actor,
        protocol_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<AssignedUser>> {
        let conn = self.lock();
        let (_, total_weeks) = protocols::header(&conn, &actor.product_id, protocol_id)?;
        let mut stmt = conn.prepare(
            "SELECT a.id, a.user_id, u.display_name, u.email, a.assignment_slot, a.status,
                a.current_week, a.current_day, a.days_completed, a.days_skipped,
                a.started_at, a.completed_at
             FROM assignments a
             LEFT JOIN users u ON u.id = a.user_id AND u.product_id = a.product_id
             WHERE a.product_id = ?1 AND a.protocol_id = ?2
               AND (?3 OR a.status IN ('active', 'paused'))
             ORDER BY a.started_at, a.user_id",
        )?;
        let rows = stmt.query_map(params![actor.product_id, protocol_id, include_inactive], |row| {
            let current_week: Option<u32> = row.get(6)?;
            let current_day: Option<u32> = row.get(7)?;
            Ok(AssignedUser {
                assignment_id: row.get(0)?,
                user_id: row.get(1)?,
                display_name: row.get(2)?,
                email: row.get(3)?,
                slot: parse_col(row, 4)?,
                status: parse_col(row, 5)?,
                current_week,
                current_day,
                progress_percent: progress_percent(current_week, current_day, total_weeks),
                days_completed: row.get(8)?,
                days_skipped: row.get(9)?,
                started_at: ts_col(row, 10)?,
                completed_at: opt_ts_col(row, 11)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn get(conn: &Connection, product_id: &str, assignment_id: &str) -> Result<Assignment> {
    conn.query_row(
        &format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ?1 AND product_id = ?2"),
        params![assignment_id, product_id],
        assignment_from_row,
    )
    .optional()?
    .ok_or_else(|| CoachError::AssignmentNotFound(assignment_id.to_string()))
}

fn conflicts(conn: &Connection, product_id: &str, user_ids: &[String], slot: Slot) -> Result<Vec<Conflict>> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT a.user_id, a.id, a.protocol_id, p.title, a.assignment_slot, a.status
         FROM assignments a JOIN protocols p ON p.id = a.protocol_id
         WHERE a.product_id = ?1 AND a.assignment_slot = ?2 AND a.status = 'active'
           AND a.user_id IN ({})
         ORDER BY a.user_id",
        placeholders(user_ids.len(), 2)
    );
    let mut stmt = conn.prepare(&sql)?;
    let bound = [product_id, slot.as_str()]
        .into_iter()
        .chain(user_ids.iter().map(String::as_str));
    let rows = stmt.query_map(params_from_iter(bound), |row| {
        Ok(Conflict {
            user_id: row.get(0)?,
            assignment_id: row.get(1)?,
            protocol_id: row.get(2)?,
            protocol_title: row.get(3)?,
            slot: parse_col(row, 4)?,
            status: parse_col(row, 5)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn assign_one(
    conn: &mut Connection,
    actor: &Actor,
    protocol_id: &str,
    user_id: &str,
    request: &AssignRequest,
) -> Result<String> {
    let tx = conn.transaction()?;
    let known: Option<String> = tx
        .query_row(
            "SELECT id FROM users WHERE id = ?1 AND product_id = ?2",
            params![user_id, actor.product_id],
            |row| row.get(0),
        )
        .optional()?;
    if known.is_none() {
        return Err(CoachError::UserNotFound(user_id.to_string()));
    }

    let ts = now();
    if request.override_conflicts {
        tx.execute(
            "UPDATE assignments SET status = 'abandoned', completed_at = ?1
             WHERE product_id = ?2 AND user_id = ?3 AND assignment_slot = ?4 AND status = 'active'",
            params![ts, actor.product_id, user_id, request.slot.as_str()],
        )?;
    } else {
        let held = conflicts(&tx, &actor.product_id, &[user_id.to_string()], request.slot)?;
        if !held.is_empty() {
            return Err(CoachError::AssignmentConflict { count: held.len() });
        }
    }

    let id = new_id();
    tx.execute(
        "INSERT INTO assignments (id, product_id, user_id, protocol_id, assignment_slot, status,
            started_at, assigned_by)
         VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?7)",
        params![
            id,
            actor.product_id,
            user_id,
            protocol_id,
            request.slot.as_str(),
            ts,
            actor.user_id
        ],
    )?;
    tx.commit()?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;
    use crate::store::NewUser;
    use crate::types::Tier;
    use chrono::NaiveDate;

    fn actor() -> Actor {
        Actor::new("coach-1", "default")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn seeded(users: &[&str]) -> Store {
        let store = Store::open_in_memory().unwrap();
        for id in users {
            store
                .upsert_user(
                    &actor(),
                    NewUser {
                        id: id.to_string(),
                        display_name: format!("User {id}"),
                        email: Some(format!("{id}@example.com")),
                        tier: Tier::Basic,
                    },
                )
                .unwrap();
        }
        store
    }

    fn protocol(store: &Store, title: &str, weeks: u32) -> String {
        let mut p = Protocol::empty();
        p.title = title.into();
        p.task_mut(0, 0, 0).unwrap().title = "Check in".into();
        for _ in 1..weeks {
            p.add_week();
        }
        store.save_protocol(&actor(), &mut p, today()).unwrap()
    }

    fn request(users: &[&str], override_conflicts: bool) -> AssignRequest {
        AssignRequest {
            user_ids: users.iter().map(|s| s.to_string()).collect(),
            slot: Slot::Primary,
            override_conflicts,
            ..Default::default()
        }
    }

    #[test]
    fn assigned_protocol_cannot_be_deleted() {
        let store = seeded(&["u1"]);
        let p = protocol(&store, "Kept", 1);
        let outcome = store.assign_protocol(&actor(), &p, &request(&["u1"], false)).unwrap();
        let assignment = outcome.results[0].assignment_id.clone().unwrap();
        store.abandon_assignment(&actor(), &assignment).unwrap();

        let err = store.delete_protocol(&actor(), &p).unwrap_err();
        assert!(matches!(err, CoachError::ProtocolInUse { assignments: 1, .. }));
        assert!(err.is_user_correctable());
        assert!(store.load_protocol(&actor(), &p).is_ok());
        assert_eq!(store.list_assigned_users(&actor(), &p, true).unwrap().len(), 1);
    }

    #[test]
    fn clean_assignment_succeeds_for_everyone() {
        let store = seeded(&["u1", "u2"]);
        let p = protocol(&store, "Reset", 2);
        let outcome = store.assign_protocol(&actor(), &p, &request(&["u1", "u2"], false)).unwrap();
        assert_eq!((outcome.success, outcome.failed), (2, 0));
        let conflicts = store.check_conflicts(&actor(), &["u1".into()], Slot::Primary).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].protocol_title, "Reset");
    }

    #[test]
    fn conflict_blocks_without_override_and_writes_nothing() {
        let store = seeded(&["u1", "u2", "u3"]);
        let old = protocol(&store, "Old", 1);
        let new = protocol(&store, "New", 1);
        store.assign_protocol(&actor(), &old, &request(&["u2"], false)).unwrap();

        let err = store
            .assign_protocol(&actor(), &new, &request(&["u1", "u2", "u3"], false))
            .unwrap_err();
        assert!(matches!(err, CoachError::AssignmentConflict { count: 1 }));
        assert!(store.list_assigned_users(&actor(), &new, true).unwrap().is_empty());
    }

    #[test]
    fn override_replaces_conflicting_assignment() {
        let store = seeded(&["u1", "u2", "u3"]);
        let old = protocol(&store, "Old", 1);
        let new = protocol(&store, "New", 1);
        store.assign_protocol(&actor(), &old, &request(&["u2"], false)).unwrap();

        let conflicts = store
            .check_conflicts(&actor(), &["u1".into(), "u2".into(), "u3".into()], Slot::Primary)
            .unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].user_id, "u2");

        let outcome = store
            .assign_protocol(&actor(), &new, &request(&["u1", "u2", "u3"], true))
            .unwrap();
        assert_eq!((outcome.success, outcome.failed), (3, 0));

        let held = store.user_assignments(&actor(), "u2").unwrap();
        let active: Vec<_> = held
            .iter()
            .filter(|a| a.status == AssignmentStatus::Active && a.slot == Slot::Primary)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].protocol_id, new);
        assert!(held.iter().any(|a| a.protocol_id == old && a.status == AssignmentStatus::Abandoned));
    }

    #[test]
    fn other_slot_is_not_a_conflict() {
        let store = seeded(&["u1"]);
        let a = protocol(&store, "A", 1);
        let b = protocol(&store, "B", 1);
        store.assign_protocol(&actor(), &a, &request(&["u1"], false)).unwrap();
        let mut secondary = request(&["u1"], false);
        secondary.slot = Slot::Secondary;
        let outcome = store.assign_protocol(&actor(), &b, &secondary).unwrap();
        assert_eq!(outcome.success, 1);
    }

    #[test]
    fn unknown_user_fails_alone() {
        let store = seeded(&["u1", "u3"]);
        let p = protocol(&store, "Partial", 1);
        let outcome = store
            .assign_protocol(&actor(), &p, &request(&["u1", "ghost", "u3"], false))
            .unwrap();
        assert_eq!((outcome.success, outcome.failed), (2, 1));
        let failed = outcome.results.iter().find(|r| !r.success).unwrap();
        assert_eq!(failed.user_id, "ghost");
        assert!(failed.error.as_deref().unwrap().contains("user not found"));
    }

    #[test]
    fn duplicate_targets_are_assigned_once() {
        let store = seeded(&["u1", "u2"]);
        let g = store.create_group(&actor(), "cohort", "").unwrap();
        store.add_group_member(&actor(), &g.id, "u1").unwrap();
        store.add_group_member(&actor(), &g.id, "u2").unwrap();
        let p = protocol(&store, "Cohort", 1);
        let req = AssignRequest {
            user_ids: vec!["u1".into()],
            group_ids: vec![g.id.clone()],
            ..Default::default()
        };
        let outcome = store.assign_protocol(&actor(), &p, &req).unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.success, 2);
    }

    #[test]
    fn empty_selection_is_rejected() {
        let store = seeded(&[]);
        let p = protocol(&store, "Nobody", 1);
        let err = store.assign_protocol(&actor(), &p, &request(&[], false)).unwrap_err();
        assert!(matches!(err, CoachError::Validation { ref field, .. } if field == "targets"));
    }

    #[test]
    fn progress_is_reported_per_learner() {
        let store = seeded(&["u1", "u2"]);
        let p = protocol(&store, "Four weeks", 4);
        let outcome = store.assign_protocol(&actor(), &p, &request(&["u1", "u2"], false)).unwrap();
        let a1 = outcome.results[0].assignment_id.clone().unwrap();
        store.update_progress(&actor(), &a1, 1, 1).unwrap();

        let users = store.list_assigned_users(&actor(), &p, false).unwrap();
        let pct = |id: &str| users.iter().find(|u| u.user_id == id).unwrap().progress_percent;
        assert_eq!(pct("u1"), 4);
        assert_eq!(pct("u2"), 0);
        assert_eq!(users[0].display_name.as_deref(), Some("User u1"));
    }

    #[test]
    fn last_day_completes_assignment() {
        let store = seeded(&["u1"]);
        let p = protocol(&store, "Short", 1);
        let outcome = store.assign_protocol(&actor(), &p, &request(&["u1"], false)).unwrap();
        let id = outcome.results[0].assignment_id.clone().unwrap();
        let done = store.update_progress(&actor(), &id, 1, 7).unwrap();
        assert_eq!(done.status, AssignmentStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.days_completed, 7);
        assert!(store.update_progress(&actor(), &id, 1, 7).is_err());
    }

    #[test]
    fn progress_outside_protocol_is_rejected() {
        let store = seeded(&["u1"]);
        let p = protocol(&store, "Two", 2);
        let outcome = store.assign_protocol(&actor(), &p, &request(&["u1"], false)).unwrap();
        let id = outcome.results[0].assignment_id.clone().unwrap();
        assert!(store.update_progress(&actor(), &id, 3, 1).is_err());
        assert!(store.update_progress(&actor(), &id, 1, 8).is_err());
    }

    #[test]
    fn abandoned_assignment_is_final() {
        let store = seeded(&["u1"]);
        let p = protocol(&store, "Quit", 1);
        let outcome = store.assign_protocol(&actor(), &p, &request(&["u1"], false)).unwrap();
        let id = outcome.results[0].assignment_id.clone().unwrap();
        let a = store.abandon_assignment(&actor(), &id).unwrap();
        assert_eq!(a.status, AssignmentStatus::Abandoned);
        assert!(store
            .set_assignment_status(&actor(), &id, AssignmentStatus::Active)
            .is_err());
        assert!(store.list_assigned_users(&actor(), &p, false).unwrap().is_empty());
        assert_eq!(store.list_assigned_users(&actor(), &p, true).unwrap().len(), 1);
    }

    #[test]
    fn resume_is_blocked_by_newer_assignment() {
        let store = seeded(&["u1"]);
        let a = protocol(&store, "A", 1);
        let b = protocol(&store, "B", 1);
        let first = store.assign_protocol(&actor(), &a, &request(&["u1"], false)).unwrap();
        let first_id = first.results[0].assignment_id.clone().unwrap();
        store
            .set_assignment_status(&actor(), &first_id, AssignmentStatus::Paused)
            .unwrap();
        store.assign_protocol(&actor(), &b, &request(&["u1"], false)).unwrap();
        let err = store
            .set_assignment_status(&actor(), &first_id, AssignmentStatus::Active)
            .unwrap_err();
        assert!(matches!(err, CoachError::AssignmentConflict { .. }));
    }

    #[test]
    fn missing_assignment_is_not_found() {
        let store = seeded(&[]);
        assert!(matches!(
            store.abandon_assignment(&actor(), "nope"),
            Err(CoachError::AssignmentNotFound(_))
        ));
    }
}
