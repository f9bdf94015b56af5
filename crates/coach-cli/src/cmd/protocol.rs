use super::{today, Workspace};
use crate::output::{print_json, print_table};
use anyhow::{bail, Context};
use clap::Subcommand;
use coach_core::import::{self, Format, ProtocolDocument};
use coach_core::protocol::{Protocol, DAYS_PER_WEEK};
use coach_core::types::{ScheduleType, Tier};
use coach_core::visibility::Visibility;
use coach_core::{io, paths};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Subcommand)]
pub enum ProtocolSubcommand {
    /// Create a protocol from a title and tasks
    New {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Number of weeks
        #[arg(long, default_value_t = 1)]
        weeks: u32,
        /// Task as WEEK:DAY:TITLE (repeatable: --task 1:1:Walk --task 1:3:Journal)
        #[arg(long = "task", value_name = "WEEK:DAY:TITLE")]
        tasks: Vec<String>,
        /// Start date (YYYY-MM-DD); makes the protocol date-specific
        #[arg(long)]
        start_date: Option<chrono::NaiveDate>,
        /// Visible to these tiers only (repeatable)
        #[arg(long = "tier")]
        tiers: Vec<String>,
        /// Visible to these users only (repeatable)
        #[arg(long = "visible-to")]
        users: Vec<String>,
        /// Visible to members of these groups (repeatable)
        #[arg(long = "group")]
        groups: Vec<String>,
    },
    /// List protocols
    List,
    /// Show a protocol week by week
    Show { id: String },
    /// Create a protocol from a YAML or JSON document
    Import { file: PathBuf },
    /// Write a protocol document (default: .coach/exports/<slug>.yaml)
    Export {
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check a protocol document without saving it
    Validate { file: PathBuf },
}

pub fn run(root: &Path, user: &str, subcmd: ProtocolSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ProtocolSubcommand::New {
            title,
            description,
            weeks,
            tasks,
            start_date,
            tiers,
            users,
            groups,
        } => {
            let visibility = visibility_from_flags(&tiers, users, groups)?;
            let draft = Draft {
                title,
                description,
                weeks,
                tasks: &tasks,
                start_date,
                visibility,
            };
            new(root, user, draft, json)
        }
        ProtocolSubcommand::List => list(root, user, json),
        ProtocolSubcommand::Show { id } => show(root, user, &id, json),
        ProtocolSubcommand::Import { file } => import_doc(root, user, &file, json),
        ProtocolSubcommand::Export { id, out } => export(root, user, &id, out, json),
        ProtocolSubcommand::Validate { file } => validate(&file, json),
    }
}

// ---------------------------------------------------------------------------
// new
// ---------------------------------------------------------------------------

struct Draft<'a> {
    title: String,
    description: String,
    weeks: u32,
    tasks: &'a [String],
    start_date: Option<chrono::NaiveDate>,
    visibility: Visibility,
}

fn visibility_from_flags(
    tiers: &[String],
    users: Vec<String>,
    groups: Vec<String>,
) -> anyhow::Result<Visibility> {
    let given = [!tiers.is_empty(), !users.is_empty(), !groups.is_empty()];
    if given.iter().filter(|g| **g).count() > 1 {
        bail!("use only one of --tier, --visible-to and --group");
    }
    if !tiers.is_empty() {
        let tiers = tiers
            .iter()
            .map(|t| Tier::from_str(t))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Visibility::TierBased { tiers });
    }
    if !users.is_empty() {
        return Ok(Visibility::Individual { user_ids: users });
    }
    if !groups.is_empty() {
        return Ok(Visibility::CustomGroup { group_ids: groups });
    }
    Ok(Visibility::AllUsers)
}

/// Parse `WEEK:DAY:TITLE` into 1-based week and day numbers.
fn parse_task_spec(spec: &str) -> anyhow::Result<(u32, u32, String)> {
    let mut parts = spec.splitn(3, ':');
    let (Some(week), Some(day), Some(title)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("task '{spec}' is not WEEK:DAY:TITLE");
    };
    let week: u32 = week
        .trim()
        .parse()
        .with_context(|| format!("bad week in task '{spec}'"))?;
    let day: u32 = day
        .trim()
        .parse()
        .with_context(|| format!("bad day in task '{spec}'"))?;
    if week == 0 || day == 0 || day > DAYS_PER_WEEK {
        bail!("task '{spec}': week starts at 1 and day must be 1..{DAYS_PER_WEEK}");
    }
    Ok((week, day, title.trim().to_string()))
}

fn place_task(protocol: &mut Protocol, week: u32, day: u32, title: String) -> anyhow::Result<()> {
    let (w, d) = ((week - 1) as usize, (day - 1) as usize);
    let Some(existing) = protocol.day(w, d) else {
        bail!("task for week {week} day {day}: protocol has {} week(s)", protocol.total_weeks);
    };
    let index = match existing.tasks.as_slice() {
        [only] if only.is_blank() => 0,
        tasks => {
            let next = tasks.len();
            protocol.add_task(w, d)?;
            next
        }
    };
    protocol.task_mut(w, d, index)?.title = title;
    Ok(())
}

fn new(root: &Path, user: &str, draft: Draft<'_>, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;

    let mut protocol = Protocol::empty();
    protocol.title = draft.title;
    protocol.description = draft.description;
    protocol.visibility = draft.visibility;
    for _ in 1..draft.weeks.max(1) {
        protocol.add_week();
    }
    if let Some(date) = draft.start_date {
        protocol.schedule_type = ScheduleType::DateSpecific;
        protocol.start_date = Some(date);
    }
    for spec in draft.tasks {
        let (week, day, title) = parse_task_spec(spec)?;
        place_task(&mut protocol, week, day, title)?;
    }

    let id = ws
        .store
        .save_protocol(&ws.actor, &mut protocol, today())
        .context("failed to save protocol")?;

    if json {
        print_json(&serde_json::json!({
            "id": id,
            "title": protocol.title,
            "stats": protocol.stats(),
        }))?;
    } else {
        let stats = protocol.stats();
        println!(
            "Created protocol {id}: {} ({} week(s), {} task(s))",
            protocol.title, stats.total_weeks, stats.total_tasks
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// list / show
// ---------------------------------------------------------------------------

fn list(root: &Path, user: &str, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    let protocols = ws.store.list_protocols(&ws.actor)?;
    if json {
        return print_json(&protocols);
    }
    if protocols.is_empty() {
        println!("No protocols.");
        return Ok(());
    }
    let rows = protocols
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                p.title.clone(),
                p.visibility_mode.to_string(),
                p.total_weeks.to_string(),
                p.task_count.to_string(),
                p.active_assignments.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "TITLE", "VISIBILITY", "WEEKS", "TASKS", "ACTIVE"], rows);
    Ok(())
}

fn show(root: &Path, user: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    let protocol = ws
        .store
        .load_protocol(&ws.actor, id)
        .with_context(|| format!("failed to load protocol '{id}'"))?;
    let stats = protocol.stats();
    if json {
        return print_json(&serde_json::json!({
            "id": id,
            "protocol": protocol,
            "stats": stats,
        }));
    }

    println!("{} ({id})", protocol.title);
    if !protocol.description.is_empty() {
        println!("{}", protocol.description);
    }
    println!(
        "visibility: {}  schedule: {}  tasks: {}  minutes: {}",
        protocol.visibility.mode(),
        protocol.schedule_type,
        stats.total_tasks,
        stats.total_minutes
    );
    for week in &protocol.weeks {
        match &week.theme {
            Some(theme) => println!("\nWeek {}: {theme}", week.week_number),
            None => println!("\nWeek {}", week.week_number),
        }
        for day in week.days.iter().filter(|d| d.has_tasks()) {
            for task in day.tasks.iter().filter(|t| !t.is_blank()) {
                println!(
                    "  day {}  [{}] {} ({})",
                    day.day_number, task.task_type, task.title, task.time_of_day
                );
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// import / export / validate
// ---------------------------------------------------------------------------

fn import_doc(root: &Path, user: &str, file: &Path, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    let mut protocol = import::import_file(file)
        .with_context(|| format!("failed to import {}", file.display()))?;
    let id = ws
        .store
        .save_protocol(&ws.actor, &mut protocol, today())
        .context("failed to save protocol")?;
    if json {
        print_json(&serde_json::json!({
            "id": id,
            "title": protocol.title,
            "stats": protocol.stats(),
        }))?;
    } else {
        println!("Imported {} as {id}", protocol.title);
    }
    Ok(())
}

fn export(root: &Path, user: &str, id: &str, out: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    let protocol = ws
        .store
        .load_protocol(&ws.actor, id)
        .with_context(|| format!("failed to load protocol '{id}'"))?;
    let path = out.unwrap_or_else(|| io::export_path(&paths::exports_dir(root), &protocol.title));
    import::export_file(&protocol, &path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    if json {
        print_json(&serde_json::json!({
            "id": id,
            "path": path,
            "format": match Format::from_path(&path) {
                Format::Json => "json",
                Format::Yaml => "yaml",
            },
        }))?;
    } else {
        println!("Exported {} to {}", protocol.title, path.display());
    }
    Ok(())
}

fn validate(file: &Path, json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let doc = import::parse(&text, Format::from_path(file))?;
    let result = ProtocolDocument::into_protocol(doc).and_then(|p| {
        p.validate(today())?;
        Ok(p)
    });
    match result {
        Ok(protocol) => {
            if json {
                print_json(&serde_json::json!({
                    "valid": true,
                    "title": protocol.title,
                    "stats": protocol.stats(),
                }))?;
            } else {
                let stats = protocol.stats();
                println!(
                    "{} is valid: {} week(s), {} task(s)",
                    file.display(),
                    stats.total_weeks,
                    stats.total_tasks
                );
            }
            Ok(())
        }
        Err(e) => {
            if json {
                print_json(&serde_json::json!({ "valid": false, "error": e.to_string() }))?;
            }
            Err(e).with_context(|| format!("{} is not a valid protocol", file.display()))
        }
    }
}
