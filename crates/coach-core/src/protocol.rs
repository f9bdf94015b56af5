//! Editable protocol content model: Protocol → Weeks → Days → Tasks.
//!
//! The nested shape is what an operator edits. On save it is flattened into
//! [`TaskRecord`] rows stamped with week, day and order; on load the rows are
//! grouped back into the nested shape. Every week always holds exactly
//! [`DAYS_PER_WEEK`] days, and both `week_number` and `task_order` stay
//! contiguous from 1 across every mutation.

use crate::error::{CoachError, Result};
use crate::reorder::{self, Ordered};
use crate::types::{ScheduleType, TaskType, TimeOfDay};
use crate::visibility::Visibility;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use uuid::Uuid;

pub const DAYS_PER_WEEK: u32 = 7;
pub const DEFAULT_THEME_COLOR: &str = "#6366f1";
const TRANSIENT_PREFIX: &str = "tmp-";

/// Identifier for a task that has not been persisted yet.
pub fn transient_id() -> String {
    format!("{TRANSIENT_PREFIX}{}", Uuid::new_v4())
}

pub fn is_transient_id(id: &str) -> bool {
    id.starts_with(TRANSIENT_PREFIX)
}

// ---------------------------------------------------------------------------
// Task / Day / Week
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub task_order: u32,
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub resource_url: Option<String>,
}

impl Task {
    pub fn empty(task_order: u32) -> Self {
        Self {
            id: transient_id(),
            task_order,
            title: String::new(),
            instructions: String::new(),
            task_type: TaskType::default(),
            time_of_day: TimeOfDay::default(),
            duration_minutes: None,
            resource_url: None,
        }
    }

    /// A task with no title is a draft placeholder and is never persisted.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
    }
}

impl Ordered for Task {
    fn set_order(&mut self, order: u32) {
        self.task_order = order;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub day_number: u32,
    pub tasks: Vec<Task>,
}

impl Day {
    fn with_placeholder(day_number: u32) -> Self {
        Self {
            day_number,
            tasks: vec![Task::empty(1)],
        }
    }

    pub fn has_tasks(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_blank())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week {
    pub week_number: u32,
    #[serde(default)]
    pub theme: Option<String>,
    pub days: Vec<Day>,
}

impl Week {
    fn new(week_number: u32) -> Self {
        Self {
            week_number,
            theme: None,
            days: (1..=DAYS_PER_WEEK).map(Day::with_placeholder).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Flattened persistence form
// ---------------------------------------------------------------------------

/// One persisted task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// `None` until the row has been written.
    pub id: Option<String>,
    pub week_number: u32,
    pub day_number: u32,
    pub task_order: u32,
    pub title: String,
    pub instructions: String,
    pub task_type: TaskType,
    pub time_of_day: TimeOfDay,
    pub duration_minutes: Option<u32>,
    pub resource_url: Option<String>,
}

/// Persisted protocol header, without its tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    pub schedule_type: ScheduleType,
    pub start_date: Option<NaiveDate>,
    pub theme_color: String,
    pub total_weeks: u32,
    /// `(week_number, theme)` pairs for weeks that carry a theme.
    pub week_themes: Vec<(u32, String)>,
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    /// Persisted identifier; `None` while the protocol is a new draft.
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    pub schedule_type: ScheduleType,
    pub start_date: Option<NaiveDate>,
    pub theme_color: String,
    pub total_weeks: u32,
    pub weeks: Vec<Week>,
}

/// Counts shown alongside a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtocolStats {
    pub total_weeks: u32,
    pub total_tasks: usize,
    pub days_with_tasks: usize,
    pub total_minutes: u32,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::empty()
    }
}

impl Protocol {
    /// One week of seven days, each holding one empty task.
    pub fn empty() -> Self {
        Self {
            id: None,
            title: String::new(),
            description: String::new(),
            visibility: Visibility::AllUsers,
            schedule_type: ScheduleType::Immediate,
            start_date: None,
            theme_color: DEFAULT_THEME_COLOR.to_string(),
            total_weeks: 1,
            weeks: vec![Week::new(1)],
        }
    }

    // -----------------------------------------------------------------------
    // Week mutations
    // -----------------------------------------------------------------------

    /// Append a week and return its number.
    pub fn add_week(&mut self) -> u32 {
        let number = self.weeks.len() as u32 + 1;
        self.weeks.push(Week::new(number));
        self.sync_weeks();
        number
    }

    /// Remove the week at `index` (0-based) and renumber the rest.
    pub fn remove_week(&mut self, index: usize) -> Result<Week> {
        self.check_week(index)?;
        let removed = self.weeks.remove(index);
        self.sync_weeks();
        Ok(removed)
    }

    /// Append a copy of the week at `index` with fresh task ids.
    pub fn duplicate_week(&mut self, index: usize) -> Result<u32> {
        self.check_week(index)?;
        let mut copy = self.weeks[index].clone();
        for task in copy.days.iter_mut().flat_map(|d| d.tasks.iter_mut()) {
            task.id = transient_id();
        }
        self.weeks.push(copy);
        self.sync_weeks();
        Ok(self.weeks.len() as u32)
    }

    pub fn set_week_theme(&mut self, index: usize, theme: Option<String>) -> Result<()> {
        self.check_week(index)?;
        self.weeks[index].theme = theme.filter(|t| !t.trim().is_empty());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Task mutations
    // -----------------------------------------------------------------------

    /// Append an empty task to a day and return its transient id.
    pub fn add_task(&mut self, week: usize, day: usize) -> Result<String> {
        let d = self.day_mut(week, day)?;
        let task = Task::empty(d.tasks.len() as u32 + 1);
        let id = task.id.clone();
        d.tasks.push(task);
        Ok(id)
    }

    /// Remove a task and renumber its siblings. A day may end up empty.
    pub fn remove_task(&mut self, week: usize, day: usize, index: usize) -> Result<Task> {
        let d = self.day_mut(week, day)?;
        if index >= d.tasks.len() {
            return Err(CoachError::validation(
                "task_order",
                format!("day has no task at position {}", index + 1),
            ));
        }
        let removed = d.tasks.remove(index);
        reorder::renumber(&mut d.tasks);
        Ok(removed)
    }

    pub fn move_task(&mut self, week: usize, day: usize, from: usize, to: usize) -> Result<()> {
        let d = self.day_mut(week, day)?;
        reorder::move_item(&mut d.tasks, from, to)
    }

    pub fn task_mut(&mut self, week: usize, day: usize, index: usize) -> Result<&mut Task> {
        let d = self.day_mut(week, day)?;
        d.tasks.get_mut(index).ok_or_else(|| {
            CoachError::validation("task_order", format!("day has no task at position {}", index + 1))
        })
    }

    pub fn day(&self, week: usize, day: usize) -> Option<&Day> {
        self.weeks.get(week).and_then(|w| w.days.get(day))
    }

    fn day_mut(&mut self, week: usize, day: usize) -> Result<&mut Day> {
        self.check_week(week)?;
        self.weeks[week].days.get_mut(day).ok_or_else(|| {
            CoachError::validation("day", format!("day must be 1..{DAYS_PER_WEEK}, got {}", day + 1))
        })
    }

    fn check_week(&self, index: usize) -> Result<()> {
        if index >= self.weeks.len() {
            return Err(CoachError::validation(
                "week",
                format!("protocol has {} week(s), no week {}", self.weeks.len(), index + 1),
            ));
        }
        Ok(())
    }

    fn sync_weeks(&mut self) {
        for (i, week) in self.weeks.iter_mut().enumerate() {
            week.week_number = i as u32 + 1;
        }
        self.total_weeks = self.weeks.len() as u32;
    }

    // -----------------------------------------------------------------------
    // Flatten / load
    // -----------------------------------------------------------------------

    /// Task rows to persist, skipping blank tasks. Positions are renumbered
    /// within each day over the tasks that remain.
    pub fn flatten_for_save(&self) -> Vec<TaskRecord> {
        let mut out = Vec::new();
        for week in &self.weeks {
            for day in &week.days {
                let kept = day.tasks.iter().filter(|t| !t.is_blank());
                for (i, task) in kept.enumerate() {
                    out.push(TaskRecord {
                        id: (!is_transient_id(&task.id)).then(|| task.id.clone()),
                        week_number: week.week_number,
                        day_number: day.day_number,
                        task_order: i as u32 + 1,
                        title: task.title.trim().to_string(),
                        instructions: task.instructions.clone(),
                        task_type: task.task_type,
                        time_of_day: task.time_of_day,
                        duration_minutes: task.duration_minutes,
                        resource_url: task
                            .resource_url
                            .as_ref()
                            .map(|u| u.trim().to_string())
                            .filter(|u| !u.is_empty()),
                    });
                }
            }
        }
        out
    }

    /// Rebuild the nested shape from persisted rows. Days without rows get a
    /// single placeholder task so the editor always has something to fill in.
    pub fn from_persisted(record: ProtocolRecord, tasks: Vec<TaskRecord>) -> Result<Self> {
        let mut grouped: BTreeMap<(u32, u32), Vec<TaskRecord>> = BTreeMap::new();
        for row in tasks {
            if row.day_number == 0 || row.day_number > DAYS_PER_WEEK || row.week_number == 0 {
                return Err(CoachError::Load(format!(
                    "task '{}' has out-of-range position week {} day {}",
                    row.title, row.week_number, row.day_number
                )));
            }
            grouped
                .entry((row.week_number, row.day_number))
                .or_default()
                .push(row);
        }

        let max_row_week = grouped.keys().map(|(w, _)| *w).max().unwrap_or(0);
        let week_count = record.total_weeks.max(max_row_week).max(1);

        let mut weeks: Vec<Week> = Vec::with_capacity(week_count as usize);
        for week_number in 1..=week_count {
            let theme = record
                .week_themes
                .iter()
                .find(|(n, _)| *n == week_number)
                .map(|(_, t)| t.clone());
            let days = (1..=DAYS_PER_WEEK)
                .map(|day_number| match grouped.remove(&(week_number, day_number)) {
                    Some(mut rows) => {
                        rows.sort_by_key(|r| r.task_order);
                        let mut tasks: Vec<Task> = rows.into_iter().map(task_from_record).collect();
                        reorder::renumber(&mut tasks);
                        Day { day_number, tasks }
                    }
                    None => Day::with_placeholder(day_number),
                })
                .collect();
            weeks.push(Week {
                week_number,
                theme,
                days,
            });
        }

        Ok(Self {
            id: Some(record.id),
            title: record.title,
            description: record.description,
            visibility: record.visibility,
            schedule_type: record.schedule_type,
            start_date: record.start_date,
            theme_color: record.theme_color,
            total_weeks: week_count,
            weeks,
        })
    }

    /// Replace task ids with persisted ones, in [`Protocol::flatten_for_save`] order.
    pub fn adopt_task_ids(&mut self, ids: &[String]) {
        let titled = self
            .weeks
            .iter_mut()
            .flat_map(|w| w.days.iter_mut())
            .flat_map(|d| d.tasks.iter_mut())
            .filter(|t| !t.is_blank());
        for (task, id) in titled.zip(ids) {
            task.id = id.clone();
        }
    }

    /// `(week_number, theme)` for each themed week.
    pub fn week_themes(&self) -> Vec<(u32, String)> {
        self.weeks
            .iter()
            .filter_map(|w| w.theme.clone().map(|t| (w.week_number, t)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Checks run before save. `today` is compared by date only.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CoachError::validation("title", "protocol title is required"));
        }
        if self.total_weeks as usize != self.weeks.len() {
            return Err(CoachError::validation(
                "week",
                format!(
                    "total_weeks is {} but the protocol has {} week(s)",
                    self.total_weeks,
                    self.weeks.len()
                ),
            ));
        }
        if self.stats().total_tasks == 0 {
            return Err(CoachError::validation(
                "tasks",
                "add at least one task with a title",
            ));
        }
        if self.schedule_type == ScheduleType::DateSpecific {
            match self.start_date {
                None => {
                    return Err(CoachError::validation(
                        "start_date",
                        "a start date is required for date-specific protocols",
                    ))
                }
                Some(d) if d < today => {
                    return Err(CoachError::validation(
                        "start_date",
                        format!("start date {d} is in the past"),
                    ))
                }
                Some(_) => {}
            }
        }
        self.visibility.validate()?;

        if !color_re().is_match(&self.theme_color) {
            return Err(CoachError::validation(
                "theme_color",
                format!("'{}' is not a #rrggbb color", self.theme_color),
            ));
        }
        for task in self.weeks.iter().flat_map(|w| &w.days).flat_map(|d| &d.tasks) {
            if task.is_blank() {
                continue;
            }
            if let Some(url) = task.resource_url.as_deref().map(str::trim) {
                if !url.is_empty() && !url_re().is_match(url) {
                    return Err(CoachError::validation(
                        "resource_url",
                        format!("'{url}' on task '{}' is not an http(s) URL", task.title),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> ProtocolStats {
        let days = self.weeks.iter().flat_map(|w| &w.days);
        let mut total_tasks = 0;
        let mut days_with_tasks = 0;
        let mut total_minutes = 0;
        for day in days {
            let titled: Vec<&Task> = day.tasks.iter().filter(|t| !t.is_blank()).collect();
            if !titled.is_empty() {
                days_with_tasks += 1;
            }
            total_tasks += titled.len();
            total_minutes += titled.iter().filter_map(|t| t.duration_minutes).sum::<u32>();
        }
        ProtocolStats {
            total_weeks: self.weeks.len() as u32,
            total_tasks,
            days_with_tasks,
            total_minutes,
        }
    }
}

fn task_from_record(r: TaskRecord) -> Task {
    Task {
        id: r.id.unwrap_or_else(transient_id),
        task_order: r.task_order,
        title: r.title,
        instructions: r.instructions,
        task_type: r.task_type,
        time_of_day: r.time_of_day,
        duration_minutes: r.duration_minutes,
        resource_url: r.resource_url,
    }
}

static COLOR_RE: OnceLock<Regex> = OnceLock::new();
static URL_RE: OnceLock<Regex> = OnceLock::new();

fn color_re() -> &'static Regex {
    COLOR_RE.get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap())
}

fn url_re() -> &'static Regex {
    URL_RE.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tier;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn titled(title: &str) -> Protocol {
        let mut p = Protocol::empty();
        p.title = title.to_string();
        p.task_mut(0, 0, 0).unwrap().title = "Morning journal".into();
        p
    }

    fn week_numbers(p: &Protocol) -> Vec<u32> {
        p.weeks.iter().map(|w| w.week_number).collect()
    }

    fn orders(d: &Day) -> Vec<u32> {
        d.tasks.iter().map(|t| t.task_order).collect()
    }

    #[test]
    fn empty_protocol_shape() {
        let p = Protocol::empty();
        assert_eq!(p.weeks.len(), 1);
        assert_eq!(p.total_weeks, 1);
        assert_eq!(p.weeks[0].days.len(), 7);
        for (i, day) in p.weeks[0].days.iter().enumerate() {
            assert_eq!(day.day_number, i as u32 + 1);
            assert_eq!(day.tasks.len(), 1);
            assert!(day.tasks[0].is_blank());
            assert!(is_transient_id(&day.tasks[0].id));
        }
        assert_eq!(p.visibility, Visibility::AllUsers);
        assert_eq!(p.schedule_type, ScheduleType::Immediate);
    }

    #[test]
    fn week_numbers_stay_contiguous() {
        let mut p = Protocol::empty();
        p.add_week();
        p.add_week();
        p.add_week();
        assert_eq!(week_numbers(&p), [1, 2, 3, 4]);
        p.remove_week(1).unwrap();
        assert_eq!(week_numbers(&p), [1, 2, 3]);
        p.remove_week(0).unwrap();
        p.add_week();
        p.remove_week(2).unwrap();
        assert_eq!(week_numbers(&p), [1, 2]);
        assert_eq!(p.total_weeks, 2);
    }

    #[test]
    fn remove_week_out_of_range_leaves_model_untouched() {
        let mut p = Protocol::empty();
        let before = p.clone();
        let err = p.remove_week(3).unwrap_err();
        assert!(matches!(err, CoachError::Validation { ref field, .. } if field == "week"));
        assert_eq!(p, before);
    }

    #[test]
    fn task_orders_stay_contiguous() {
        let mut p = Protocol::empty();
        p.add_task(0, 2).unwrap();
        p.add_task(0, 2).unwrap();
        p.add_task(0, 2).unwrap();
        assert_eq!(orders(&p.weeks[0].days[2]), [1, 2, 3, 4]);
        p.remove_task(0, 2, 1).unwrap();
        assert_eq!(orders(&p.weeks[0].days[2]), [1, 2, 3]);
        p.remove_task(0, 2, 0).unwrap();
        p.add_task(0, 2).unwrap();
        assert_eq!(orders(&p.weeks[0].days[2]), [1, 2, 3]);
    }

    #[test]
    fn model_permits_an_empty_day() {
        let mut p = Protocol::empty();
        p.remove_task(0, 0, 0).unwrap();
        assert!(p.weeks[0].days[0].tasks.is_empty());
        assert!(p.remove_task(0, 0, 0).is_err());
    }

    #[test]
    fn day_index_is_bounded_by_week_length() {
        let mut p = Protocol::empty();
        assert!(p.add_task(0, 7).is_err());
        assert!(p.add_task(1, 0).is_err());
    }

    #[test]
    fn move_task_reorders_and_renumbers() {
        let mut p = Protocol::empty();
        p.add_task(0, 0).unwrap();
        p.task_mut(0, 0, 0).unwrap().title = "first".into();
        p.task_mut(0, 0, 1).unwrap().title = "second".into();
        p.move_task(0, 0, 1, 0).unwrap();
        let day = &p.weeks[0].days[0];
        assert_eq!(day.tasks[0].title, "second");
        assert_eq!(orders(day), [1, 2]);
    }

    #[test]
    fn duplicate_week_gets_fresh_ids() {
        let mut p = titled("Dup");
        let n = p.duplicate_week(0).unwrap();
        assert_eq!(n, 2);
        assert_eq!(p.weeks[1].days[0].tasks[0].title, "Morning journal");
        assert_ne!(p.weeks[0].days[0].tasks[0].id, p.weeks[1].days[0].tasks[0].id);
    }

    #[test]
    fn flatten_skips_blank_titles_and_stamps_positions() {
        let mut p = Protocol::empty();
        p.add_week();
        p.add_task(1, 3).unwrap();
        p.add_task(1, 3).unwrap();
        p.task_mut(1, 3, 0).unwrap().title = "  ".into();
        p.task_mut(1, 3, 1).unwrap().title = "Read chapter".into();
        p.task_mut(1, 3, 2).unwrap().title = "Reflect".into();

        let rows = p.flatten_for_save();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].week_number, rows[0].day_number, rows[0].task_order), (2, 4, 1));
        assert_eq!(rows[0].title, "Read chapter");
        assert_eq!(rows[1].task_order, 2);
        assert!(rows.iter().all(|r| r.id.is_none()));
    }

    #[test]
    fn flatten_then_load_roundtrips_positions() {
        let mut p = titled("Roundtrip");
        p.add_week();
        p.add_task(1, 6).unwrap();
        p.task_mut(1, 6, 0).unwrap().title = "Evening review".into();
        p.task_mut(1, 6, 1).unwrap().title = "Gratitude".into();
        p.set_week_theme(1, Some("Momentum".into())).unwrap();

        let rows = p.flatten_for_save();
        let record = ProtocolRecord {
            id: "p1".into(),
            title: p.title.clone(),
            description: String::new(),
            visibility: Visibility::AllUsers,
            schedule_type: ScheduleType::Immediate,
            start_date: None,
            theme_color: DEFAULT_THEME_COLOR.into(),
            total_weeks: p.total_weeks,
            week_themes: p.week_themes(),
        };
        let loaded = Protocol::from_persisted(record, rows.clone()).unwrap();
        let key = |r: &TaskRecord| (r.week_number, r.day_number, r.task_order, r.title.clone());
        let again: Vec<_> = loaded.flatten_for_save().iter().map(key).collect();
        let first: Vec<_> = rows.iter().map(key).collect();
        assert_eq!(again, first);
        assert_eq!(loaded.weeks[1].theme.as_deref(), Some("Momentum"));
    }

    #[test]
    fn load_fills_empty_days_with_placeholder() {
        let record = ProtocolRecord {
            id: "p1".into(),
            title: "Short".into(),
            description: String::new(),
            visibility: Visibility::AllUsers,
            schedule_type: ScheduleType::Rolling,
            start_date: None,
            theme_color: DEFAULT_THEME_COLOR.into(),
            total_weeks: 2,
            week_themes: vec![],
        };
        let rows = vec![
            TaskRecord {
                id: Some("t2".into()),
                week_number: 1,
                day_number: 1,
                task_order: 2,
                title: "B".into(),
                instructions: String::new(),
                task_type: TaskType::Reading,
                time_of_day: TimeOfDay::Evening,
                duration_minutes: Some(10),
                resource_url: None,
            },
            TaskRecord {
                id: Some("t1".into()),
                week_number: 1,
                day_number: 1,
                task_order: 1,
                title: "A".into(),
                instructions: String::new(),
                task_type: TaskType::Action,
                time_of_day: TimeOfDay::Morning,
                duration_minutes: None,
                resource_url: None,
            },
        ];
        let p = Protocol::from_persisted(record, rows).unwrap();
        assert_eq!(p.weeks.len(), 2);
        let d1 = &p.weeks[0].days[0];
        assert_eq!(d1.tasks.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(), ["A", "B"]);
        assert_eq!(d1.tasks[0].id, "t1");
        for day in p.weeks.iter().flat_map(|w| &w.days).skip(1) {
            assert_eq!(day.tasks.len(), 1);
            assert!(day.tasks[0].is_blank());
        }
    }

    #[test]
    fn load_rejects_day_outside_week() {
        let record = ProtocolRecord {
            id: "p1".into(),
            title: "Bad".into(),
            description: String::new(),
            visibility: Visibility::AllUsers,
            schedule_type: ScheduleType::Immediate,
            start_date: None,
            theme_color: DEFAULT_THEME_COLOR.into(),
            total_weeks: 1,
            week_themes: vec![],
        };
        let mut row = titled("x").flatten_for_save().remove(0);
        row.day_number = 8;
        assert!(matches!(
            Protocol::from_persisted(record, vec![row]),
            Err(CoachError::Load(_))
        ));
    }

    fn field_of(err: CoachError) -> String {
        match err {
            CoachError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn validation_requires_title_then_tasks() {
        let p = Protocol::empty();
        assert_eq!(field_of(p.validate(today()).unwrap_err()), "title");

        let mut p = Protocol::empty();
        p.title = "Untitled tasks".into();
        assert_eq!(field_of(p.validate(today()).unwrap_err()), "tasks");

        assert!(titled("Ok").validate(today()).is_ok());
    }

    #[test]
    fn date_specific_needs_present_or_future_date() {
        let mut p = titled("Dated");
        p.schedule_type = ScheduleType::DateSpecific;
        assert_eq!(field_of(p.validate(today()).unwrap_err()), "start_date");

        p.start_date = NaiveDate::from_ymd_opt(2026, 3, 9);
        assert_eq!(field_of(p.validate(today()).unwrap_err()), "start_date");

        p.start_date = Some(today());
        assert!(p.validate(today()).is_ok());
    }

    #[test]
    fn visibility_selection_is_checked_on_save() {
        let mut p = titled("Tiered");
        p.visibility = Visibility::TierBased { tiers: vec![] };
        assert_eq!(field_of(p.validate(today()).unwrap_err()), "visibility");

        p.visibility = Visibility::TierBased {
            tiers: vec![Tier::Premium],
        };
        assert!(p.validate(today()).is_ok());
    }

    #[test]
    fn theme_color_and_resource_url_are_checked() {
        let mut p = titled("Colors");
        p.theme_color = "indigo".into();
        assert_eq!(field_of(p.validate(today()).unwrap_err()), "theme_color");

        let mut p = titled("Links");
        p.task_mut(0, 0, 0).unwrap().resource_url = Some("ftp://example.com/a".into());
        assert_eq!(field_of(p.validate(today()).unwrap_err()), "resource_url");

        p.task_mut(0, 0, 0).unwrap().resource_url = Some("https://example.com/a".into());
        assert!(p.validate(today()).is_ok());
    }

    #[test]
    fn stats_count_only_titled_tasks() {
        let mut p = titled("Stats");
        p.task_mut(0, 0, 0).unwrap().duration_minutes = Some(15);
        p.add_task(0, 1).unwrap();
        p.task_mut(0, 1, 1).unwrap().title = "Walk".into();
        p.task_mut(0, 1, 1).unwrap().duration_minutes = Some(20);
        let s = p.stats();
        assert_eq!(s.total_tasks, 2);
        assert_eq!(s.days_with_tasks, 2);
        assert_eq!(s.total_minutes, 35);
    }
}
