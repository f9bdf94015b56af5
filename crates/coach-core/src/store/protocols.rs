//! Protocol persistence: header row, week themes and flattened task rows.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use super::{new_id, now, opt_date_col, parse_col, ts_col, Store, DATE_FORMAT};
use crate::error::{CoachError, Result};
use crate::protocol::{Protocol, ProtocolRecord, TaskRecord};
use crate::types::{Actor, ScheduleType, VisibilityMode};
use crate::visibility::Visibility;

/// One row of the protocol list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolSummary {
    pub id: String,
    pub title: String,
    pub visibility_mode: VisibilityMode,
    pub schedule_type: ScheduleType,
    pub total_weeks: u32,
    pub task_count: u32,
    pub days_with_tasks: u32,
    pub active_assignments: u32,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    /// Validate and persist `protocol`, then write the assigned ids back into it.
    ///
    /// The header, week themes and every task row are written in one
    /// transaction. Task rows are replaced wholesale; a task keeps its id only
    /// when that id was already persisted for this protocol, and the first
    /// of any duplicates wins. Everything else gets a fresh id.
    pub fn save_protocol(
        &self,
        actor: &Actor,
        protocol: &mut Protocol,
        today: NaiveDate,
    ) -> Result<String> {
        protocol.validate(today)?;
        let rows = protocol.flatten_for_save();

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let ts = now();
        let config = protocol
            .visibility
            .config_json()
            .map(|v| v.to_string());
        let start_date = protocol
            .start_date
            .map(|d| d.format(DATE_FORMAT).to_string());

        let id = match &protocol.id {
            Some(id) => {
                let updated = tx.execute(
                    "UPDATE protocols SET title = ?1, description = ?2, visibility_mode = ?3,
                        visibility_config = ?4, schedule_type = ?5, start_date = ?6,
                        theme_color = ?7, total_weeks = ?8, updated_at = ?9
                     WHERE id = ?10 AND product_id = ?11",
                    params![
                        protocol.title.trim(),
                        protocol.description,
                        protocol.visibility.mode().as_str(),
                        config,
                        protocol.schedule_type.as_str(),
                        start_date,
                        protocol.theme_color,
                        protocol.total_weeks,
                        ts,
                        id,
                        actor.product_id,
                    ],
                )?;
                if updated == 0 {
                    return Err(CoachError::ProtocolNotFound(id.clone()));
                }
                id.clone()
            }
            None => {
                let id = new_id();
                tx.execute(
                    "INSERT INTO protocols (id, product_id, title, description, visibility_mode,
                        visibility_config, schedule_type, start_date, theme_color, total_weeks,
                        created_by, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                    params![
                        id,
                        actor.product_id,
                        protocol.title.trim(),
                        protocol.description,
                        protocol.visibility.mode().as_str(),
                        config,
                        protocol.schedule_type.as_str(),
                        start_date,
                        protocol.theme_color,
                        protocol.total_weeks,
                        actor.user_id,
                        ts,
                    ],
                )?;
                id
            }
        };

        tx.execute("DELETE FROM protocol_weeks WHERE protocol_id = ?1", [&id])?;
        for (week_number, theme) in protocol.week_themes() {
            tx.execute(
                "INSERT INTO protocol_weeks (protocol_id, week_number, theme) VALUES (?1, ?2, ?3)",
                params![id, week_number, theme],
            )?;
        }

        let mut reusable: HashSet<String> = {
            let mut stmt = tx.prepare("SELECT id FROM protocol_tasks WHERE protocol_id = ?1")?;
            let ids = stmt.query_map([&id], |row| row.get(0))?;
            ids.collect::<rusqlite::Result<_>>()?
        };
        tx.execute("DELETE FROM protocol_tasks WHERE protocol_id = ?1", [&id])?;
        let mut task_ids = Vec::with_capacity(rows.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO protocol_tasks (id, protocol_id, week_number, day_number, task_order,
                    title, instructions, task_type, time_of_day, duration_minutes, resource_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for row in &rows {
                // An id survives only if this protocol owns it and no earlier row claimed it.
                let task_id = match &row.id {
                    Some(existing) if reusable.remove(existing) => existing.clone(),
                    _ => new_id(),
                };
                stmt.execute(params![
                    task_id,
                    id,
                    row.week_number,
                    row.day_number,
                    row.task_order,
                    row.title,
                    row.instructions,
                    row.task_type.as_str(),
                    row.time_of_day.as_str(),
                    row.duration_minutes,
                    row.resource_url,
                ])?;
                task_ids.push(task_id);
            }
        }
        tx.commit()?;

        info!(
            protocol = %id,
            weeks = protocol.total_weeks,
            tasks = task_ids.len(),
            "saved protocol"
        );
        protocol.id = Some(id.clone());
        protocol.adopt_task_ids(&task_ids);
        Ok(id)
    }

    /// Load a protocol into its nested editing shape.
    pub fn load_protocol(&self, actor: &Actor, protocol_id: &str) -> Result<Protocol> {
        let conn = self.lock();
        let record = load_record(&conn, &actor.product_id, protocol_id)?;
        let tasks = load_tasks(&conn, protocol_id)
            .map_err(|e| CoachError::Load(e.to_string()))?;
        debug!(protocol = %protocol_id, rows = tasks.len(), "loaded protocol");
        Protocol::from_persisted(record, tasks)
    }

    pub fn list_protocols(&self, actor: &Actor) -> Result<Vec<ProtocolSummary>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.title, p.visibility_mode, p.schedule_type, p.total_weeks,
                (SELECT COUNT(*) FROM protocol_tasks t WHERE t.protocol_id = p.id),
                (SELECT COUNT(DISTINCT t.week_number * 8 + t.day_number)
                   FROM protocol_tasks t WHERE t.protocol_id = p.id),
                (SELECT COUNT(*) FROM assignments a
                   WHERE a.protocol_id = p.id AND a.status = 'active'),
                p.updated_at
             FROM protocols p
             WHERE p.product_id = ?1
             ORDER BY p.updated_at DESC, p.title",
        )?;
        let rows = stmt.query_map([&actor.product_id], |row| {
            Ok(ProtocolSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                visibility_mode: parse_col(row, 2)?,
                schedule_type: parse_col(row, 3)?,
                total_weeks: row.get(4)?,
                task_count: row.get(5)?,
                days_with_tasks: row.get(6)?,
                active_assignments: row.get(7)?,
                updated_at: ts_col(row, 8)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a protocol and its tasks. Refused once any assignment row
    /// references it, so assignment history is never lost.
    pub fn delete_protocol(&self, actor: &Actor, protocol_id: &str) -> Result<()> {
        let conn = self.lock();
        header(&conn, &actor.product_id, protocol_id)?;
        let assignments: u32 = conn.query_row(
            "SELECT COUNT(*) FROM assignments WHERE protocol_id = ?1",
            [protocol_id],
            |row| row.get(0),
        )?;
        if assignments > 0 {
            return Err(CoachError::ProtocolInUse {
                id: protocol_id.to_string(),
                assignments,
            });
        }
        let deleted = conn.execute(
            "DELETE FROM protocols WHERE id = ?1 AND product_id = ?2",
            params![protocol_id, actor.product_id],
        )?;
        if deleted == 0 {
            return Err(CoachError::ProtocolNotFound(protocol_id.to_string()));
        }
        info!(protocol = %protocol_id, "deleted protocol");
        Ok(())
    }
}

pub(crate) fn load_record(conn: &Connection, product_id: &str, protocol_id: &str) -> Result<ProtocolRecord> {
    let header = conn
        .query_row(
            "SELECT id, title, description, visibility_mode, visibility_config, schedule_type,
                start_date, theme_color, total_weeks
             FROM protocols WHERE id = ?1 AND product_id = ?2",
            params![protocol_id, product_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    parse_col::<VisibilityMode>(row, 3)?,
                    row.get::<_, Option<String>>(4)?,
                    parse_col::<ScheduleType>(row, 5)?,
                    opt_date_col(row, 6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, u32>(8)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| CoachError::ProtocolNotFound(protocol_id.to_string()))?;
    let (id, title, description, mode, config, schedule_type, start_date, theme_color, total_weeks) =
        header;

    let mut stmt = conn.prepare(
        "SELECT week_number, theme FROM protocol_weeks WHERE protocol_id = ?1 ORDER BY week_number",
    )?;
    let week_themes = stmt
        .query_map([protocol_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<(u32, String)>>>()?;

    Ok(ProtocolRecord {
        id,
        title,
        description,
        visibility: Visibility::from_parts(mode, config.as_deref())?,
        schedule_type,
        start_date,
        theme_color,
        total_weeks,
        week_themes,
    })
}

fn load_tasks(conn: &Connection, protocol_id: &str) -> rusqlite::Result<Vec<TaskRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, week_number, day_number, task_order, title, instructions, task_type,
            time_of_day, duration_minutes, resource_url
         FROM protocol_tasks WHERE protocol_id = ?1
         ORDER BY week_number, day_number, task_order",
    )?;
    let rows = stmt.query_map([protocol_id], |row| {
        Ok(TaskRecord {
            id: Some(row.get(0)?),
            week_number: row.get(1)?,
            day_number: row.get(2)?,
            task_order: row.get(3)?,
            title: row.get(4)?,
            instructions: row.get(5)?,
            task_type: parse_col(row, 6)?,
            time_of_day: parse_col(row, 7)?,
            duration_minutes: row.get(8)?,
            resource_url: row.get(9)?,
        })
    })?;
    rows.collect()
}

/// Title and week count, for conflict display and progress math.
pub(crate) fn header(conn: &Connection, product_id: &str, protocol_id: &str) -> Result<(String, u32)> {
    conn.query_row(
        "SELECT title, total_weeks FROM protocols WHERE id = ?1 AND product_id = ?2",
        params![protocol_id, product_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| CoachError::ProtocolNotFound(protocol_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskType, Tier};

    fn actor() -> Actor {
        Actor::new("coach-1", "default")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn draft(title: &str) -> Protocol {
        let mut p = Protocol::empty();
        p.title = title.into();
        p.task_mut(0, 0, 0).unwrap().title = "Morning pages".into();
        p
    }

    #[test]
    fn save_assigns_ids_and_load_restores_shape() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Focus");
        p.add_week();
        p.task_mut(1, 4, 0).unwrap().title = "Deep work block".into();
        p.task_mut(1, 4, 0).unwrap().task_type = TaskType::Worksheet;
        p.set_week_theme(1, Some("Depth".into())).unwrap();

        let id = store.save_protocol(&actor(), &mut p, today()).unwrap();
        assert_eq!(p.id.as_deref(), Some(id.as_str()));
        assert!(!crate::protocol::is_transient_id(&p.weeks[0].days[0].tasks[0].id));
        assert!(crate::protocol::is_transient_id(&p.weeks[0].days[1].tasks[0].id));

        let loaded = store.load_protocol(&actor(), &id).unwrap();
        assert_eq!(loaded.total_weeks, 2);
        assert_eq!(loaded.weeks[1].theme.as_deref(), Some("Depth"));
        let task = &loaded.weeks[1].days[4].tasks[0];
        assert_eq!(task.title, "Deep work block");
        assert_eq!(task.task_type, TaskType::Worksheet);
        assert_eq!(task.id, p.weeks[1].days[4].tasks[0].id);
    }

    #[test]
    fn eight_week_reset_persists_only_titled_task() {
        let store = Store::open_in_memory().unwrap();
        let mut p = Protocol::empty();
        p.title = "8-Week Reset".into();
        for _ in 1..8 {
            p.add_week();
        }
        assert_eq!(p.total_weeks, 8);
        p.task_mut(0, 0, 0).unwrap().title = "Morning journal".into();

        let id = store.save_protocol(&actor(), &mut p, today()).unwrap();
        let rows: i64 = store
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM protocol_tasks WHERE protocol_id = ?1",
                [&id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);

        let loaded = store.load_protocol(&actor(), &id).unwrap();
        assert_eq!(loaded.total_weeks, 8);
        let first = &loaded.weeks[0].days[0];
        assert_eq!(first.tasks.len(), 1);
        assert_eq!(first.tasks[0].title, "Morning journal");
        assert_eq!(first.tasks[0].task_order, 1);
        let others = loaded
            .weeks
            .iter()
            .flat_map(|w| &w.days)
            .skip(1)
            .filter(|d| d.has_tasks())
            .count();
        assert_eq!(others, 0);
        assert_eq!(loaded.flatten_for_save().len(), 1);
    }

    #[test]
    fn resave_replaces_tasks_and_keeps_persisted_ids() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Edit");
        let id = store.save_protocol(&actor(), &mut p, today()).unwrap();
        let kept_id = p.weeks[0].days[0].tasks[0].id.clone();

        let mut loaded = store.load_protocol(&actor(), &id).unwrap();
        loaded.add_task(0, 0).unwrap();
        loaded.task_mut(0, 0, 1).unwrap().title = "Second".into();
        store.save_protocol(&actor(), &mut loaded, today()).unwrap();

        let again = store.load_protocol(&actor(), &id).unwrap();
        let day = &again.weeks[0].days[0];
        assert_eq!(day.tasks.len(), 2);
        assert_eq!(day.tasks[0].id, kept_id);
        assert_eq!(day.tasks[1].title, "Second");
    }

    #[test]
    fn saving_a_loaded_copy_as_new_gets_fresh_task_ids() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Original");
        let original = store.save_protocol(&actor(), &mut p, today()).unwrap();
        let original_task = p.weeks[0].days[0].tasks[0].id.clone();

        let mut copy = store.load_protocol(&actor(), &original).unwrap();
        copy.id = None;
        copy.title = "Copy".into();
        let copied = store.save_protocol(&actor(), &mut copy, today()).unwrap();
        assert_ne!(copied, original);
        assert_ne!(copy.weeks[0].days[0].tasks[0].id, original_task);

        let first = store.load_protocol(&actor(), &original).unwrap();
        assert_eq!(first.weeks[0].days[0].tasks[0].id, original_task);
        let second = store.load_protocol(&actor(), &copied).unwrap();
        assert_eq!(second.weeks[0].days[0].tasks[0].title, "Morning pages");
    }

    #[test]
    fn duplicated_task_id_keeps_first_and_renames_the_rest() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Cloned");
        let id = store.save_protocol(&actor(), &mut p, today()).unwrap();
        let kept = p.weeks[0].days[0].tasks[0].id.clone();

        let mut loaded = store.load_protocol(&actor(), &id).unwrap();
        let clone = loaded.weeks[0].days[0].tasks[0].clone();
        loaded.weeks[0].days[1].tasks = vec![clone];
        store.save_protocol(&actor(), &mut loaded, today()).unwrap();

        let again = store.load_protocol(&actor(), &id).unwrap();
        let first = &again.weeks[0].days[0].tasks[0];
        let second = &again.weeks[0].days[1].tasks[0];
        assert_eq!(first.id, kept);
        assert_ne!(second.id, kept);
        assert_eq!(second.title, "Morning pages");
    }

    #[test]
    fn invalid_protocol_writes_nothing() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Tiered");
        p.visibility = Visibility::TierBased { tiers: vec![] };
        assert!(store.save_protocol(&actor(), &mut p, today()).is_err());
        assert!(store.list_protocols(&actor()).unwrap().is_empty());
        assert!(p.id.is_none());
    }

    #[test]
    fn visibility_survives_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Premium only");
        p.visibility = Visibility::TierBased {
            tiers: vec![Tier::Premium, Tier::Admin],
        };
        let id = store.save_protocol(&actor(), &mut p, today()).unwrap();
        let loaded = store.load_protocol(&actor(), &id).unwrap();
        assert_eq!(loaded.visibility, p.visibility);
    }

    #[test]
    fn other_products_cannot_see_protocol() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Scoped");
        let id = store.save_protocol(&actor(), &mut p, today()).unwrap();
        let other = Actor::new("coach-2", "other");
        assert!(matches!(
            store.load_protocol(&other, &id),
            Err(CoachError::ProtocolNotFound(_))
        ));
        assert!(store.list_protocols(&other).unwrap().is_empty());
    }

    #[test]
    fn unknown_id_on_update_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Ghost");
        p.id = Some("missing".into());
        assert!(matches!(
            store.save_protocol(&actor(), &mut p, today()),
            Err(CoachError::ProtocolNotFound(_))
        ));
    }

    #[test]
    fn corrupt_task_rows_surface_as_load_error() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Corrupt");
        let id = store.save_protocol(&actor(), &mut p, today()).unwrap();
        store
            .lock()
            .execute(
                "UPDATE protocol_tasks SET task_type = 'dance' WHERE protocol_id = ?1",
                [&id],
            )
            .unwrap();
        assert!(matches!(
            store.load_protocol(&actor(), &id),
            Err(CoachError::Load(_))
        ));
    }

    #[test]
    fn list_counts_tasks() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Listed");
        p.add_task(0, 0).unwrap();
        p.task_mut(0, 0, 1).unwrap().title = "Stretch".into();
        store.save_protocol(&actor(), &mut p, today()).unwrap();
        let list = store.list_protocols(&actor()).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].task_count, 2);
        assert_eq!(list[0].days_with_tasks, 1);
        assert_eq!(list[0].active_assignments, 0);
    }

    #[test]
    fn delete_removes_protocol() {
        let store = Store::open_in_memory().unwrap();
        let mut p = draft("Temp");
        let id = store.save_protocol(&actor(), &mut p, today()).unwrap();
        store.delete_protocol(&actor(), &id).unwrap();
        assert!(store.load_protocol(&actor(), &id).is_err());
        assert!(store.delete_protocol(&actor(), &id).is_err());
    }
}
