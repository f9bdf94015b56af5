//! Protocol documents: a hand-editable YAML/JSON form of a protocol.
//!
//! ```yaml
//! title: 8-Week Reset
//! theme_color: "#22c55e"
//! visibility: { mode: tier_based, tiers: [premium] }
//! weeks:
//!   - theme: Foundations
//!     days:
//!       - day: 1
//!         tasks:
//!           - title: Morning pages
//!             type: reflection
//!             duration_minutes: 10
//! ```
//!
//! Days left out of a week are empty. Only titled tasks are exported.

use crate::error::{CoachError, Result};
use crate::protocol::{Day, Protocol, Task, Week, DAYS_PER_WEEK, DEFAULT_THEME_COLOR};
use crate::reorder;
use crate::types::{ScheduleType, TaskType, TimeOfDay};
use crate::visibility::Visibility;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// `.json` is JSON; anything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDocument {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default = "default_color")]
    pub theme_color: String,
    #[serde(default)]
    pub schedule_type: ScheduleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub visibility: Visibility,
    pub weeks: Vec<WeekDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default)]
    pub days: Vec<DayDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayDocument {
    pub day: u32,
    #[serde(default)]
    pub tasks: Vec<TaskDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instructions: String,
    #[serde(default, rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_url: Option<String>,
}

fn default_color() -> String {
    DEFAULT_THEME_COLOR.to_string()
}

pub fn parse(text: &str, format: Format) -> Result<ProtocolDocument> {
    Ok(match format {
        Format::Yaml => serde_yaml::from_str(text)?,
        Format::Json => serde_json::from_str(text)?,
    })
}

pub fn render(doc: &ProtocolDocument, format: Format) -> Result<String> {
    Ok(match format {
        Format::Yaml => serde_yaml::to_string(doc)?,
        Format::Json => serde_json::to_string_pretty(doc)?,
    })
}

/// Read a document file into an unsaved protocol.
pub fn import_file(path: &Path) -> Result<Protocol> {
    let text = std::fs::read_to_string(path)?;
    parse(&text, Format::from_path(path))?.into_protocol()
}

pub fn export_file(protocol: &Protocol, path: &Path) -> Result<()> {
    let text = render(&ProtocolDocument::from_protocol(protocol), Format::from_path(path))?;
    crate::io::atomic_write(path, text.as_bytes())
}

impl ProtocolDocument {
    pub fn into_protocol(self) -> Result<Protocol> {
        if self.weeks.is_empty() {
            return Err(CoachError::validation("week", "document has no weeks"));
        }
        let mut weeks = Vec::with_capacity(self.weeks.len());
        for (w, week_doc) in self.weeks.into_iter().enumerate() {
            let week_number = w as u32 + 1;
            let mut days: Vec<Day> = (1..=DAYS_PER_WEEK)
                .map(|day_number| Day {
                    day_number,
                    tasks: Vec::new(),
                })
                .collect();
            let mut seen = [false; DAYS_PER_WEEK as usize];
            for day_doc in week_doc.days {
                if day_doc.day == 0 || day_doc.day > DAYS_PER_WEEK {
                    return Err(CoachError::validation(
                        "day",
                        format!(
                            "week {week_number} has day {}; days run 1..{DAYS_PER_WEEK}",
                            day_doc.day
                        ),
                    ));
                }
                let slot = day_doc.day as usize - 1;
                if seen[slot] {
                    return Err(CoachError::validation(
                        "day",
                        format!("week {week_number} lists day {} twice", day_doc.day),
                    ));
                }
                seen[slot] = true;
                let mut tasks: Vec<Task> = day_doc.tasks.into_iter().map(TaskDocument::into_task).collect();
                reorder::renumber(&mut tasks);
                days[slot].tasks = tasks;
            }
            weeks.push(Week {
                week_number,
                theme: week_doc.theme.filter(|t| !t.trim().is_empty()),
                days,
            });
        }

        Ok(Protocol {
            id: None,
            title: self.title,
            description: self.description,
            visibility: self.visibility,
            schedule_type: self.schedule_type,
            start_date: self.start_date,
            theme_color: self.theme_color,
            total_weeks: weeks.len() as u32,
            weeks,
        })
    }

    pub fn from_protocol(protocol: &Protocol) -> Self {
        let weeks = protocol
            .weeks
            .iter()
            .map(|week| WeekDocument {
                theme: week.theme.clone(),
                days: week
                    .days
                    .iter()
                    .filter(|d| d.has_tasks())
                    .map(|d| DayDocument {
                        day: d.day_number,
                        tasks: d
                            .tasks
                            .iter()
                            .filter(|t| !t.is_blank())
                            .map(TaskDocument::from_task)
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            title: protocol.title.clone(),
            description: protocol.description.clone(),
            theme_color: protocol.theme_color.clone(),
            schedule_type: protocol.schedule_type,
            start_date: protocol.start_date,
            visibility: protocol.visibility.clone(),
            weeks,
        }
    }
}

impl TaskDocument {
    fn into_task(self) -> Task {
        let mut task = Task::empty(0);
        task.title = self.title;
        task.instructions = self.instructions;
        task.task_type = self.task_type;
        task.time_of_day = self.time_of_day;
        task.duration_minutes = self.duration_minutes;
        task.resource_url = self.resource_url;
        task
    }

    fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            instructions: task.instructions.clone(),
            task_type: task.task_type,
            time_of_day: task.time_of_day,
            duration_minutes: task.duration_minutes,
            resource_url: task.resource_url.clone(),
        }
    }
}
