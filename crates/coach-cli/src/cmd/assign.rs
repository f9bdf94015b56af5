use super::Workspace;
use crate::output::{or_dash, print_json, print_table};
use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use coach_core::assignment::{conflict_summary, AssignFlow, FlowState};
use coach_core::store::AssignRequest;
use coach_core::types::Slot;
use coach_core::visibility::collect_targets;
use std::path::Path;

#[derive(Args)]
pub struct Targets {
    /// Learner ids (repeatable)
    #[arg(long = "user")]
    users: Vec<String>,
    /// Group ids whose members are added (repeatable)
    #[arg(long = "group")]
    groups: Vec<String>,
    /// Assignment slot: primary or secondary
    #[arg(long, default_value = "primary")]
    slot: Slot,
}

#[derive(Subcommand)]
pub enum AssignSubcommand {
    /// Show which targets already hold an active protocol in the slot
    Check {
        protocol: String,
        #[command(flatten)]
        targets: Targets,
    },
    /// Assign a protocol to users and groups
    Run {
        protocol: String,
        #[command(flatten)]
        targets: Targets,
        /// Abandon conflicting assignments instead of stopping
        #[arg(long = "override")]
        override_conflicts: bool,
    },
    /// List learners on a protocol with their progress
    List {
        protocol: String,
        /// Include completed and abandoned assignments
        #[arg(long)]
        all: bool,
    },
    /// Abandon an assignment
    Abandon { assignment: String },
    /// Record a learner's current week and day
    Progress {
        assignment: String,
        #[arg(long)]
        week: u32,
        #[arg(long)]
        day: u32,
    },
}

pub fn run(root: &Path, user: &str, subcmd: AssignSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        AssignSubcommand::Check { protocol, targets } => check(root, user, &protocol, targets, json),
        AssignSubcommand::Run {
            protocol,
            targets,
            override_conflicts,
        } => assign(root, user, &protocol, targets, override_conflicts, json),
        AssignSubcommand::List { protocol, all } => list(root, user, &protocol, all, json),
        AssignSubcommand::Abandon { assignment } => abandon(root, user, &assignment, json),
        AssignSubcommand::Progress {
            assignment,
            week,
            day,
        } => progress(root, user, &assignment, week, day, json),
    }
}

/// Select the targets and run one conflict check through the flow.
fn checked_flow(ws: &Workspace, protocol: &str, targets: Targets) -> anyhow::Result<AssignFlow> {
    ws.store
        .load_protocol(&ws.actor, protocol)
        .with_context(|| format!("failed to load protocol '{protocol}'"))?;
    let ids = collect_targets(&ws.store.members_lookup(&ws.actor), &targets.users, &targets.groups)?;

    let mut flow = AssignFlow::new(targets.slot);
    let token = flow.select(ids);
    let result = ws.store.check_conflicts(&ws.actor, flow.selected(), flow.slot());
    flow.complete_check(token, result);
    if let FlowState::Failed { error } = flow.state() {
        bail!("conflict check failed: {error}");
    }
    Ok(flow)
}

fn check(root: &Path, user: &str, protocol: &str, targets: Targets, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    let flow = checked_flow(&ws, protocol, targets)?;
    let summary = conflict_summary(flow.conflicts());

    if json {
        return print_json(&serde_json::json!({
            "slot": flow.slot(),
            "total_selected": flow.selected().len(),
            "conflicts": flow.conflicts(),
            "summary": summary,
            "can_assign_without_override": flow.can_assign(),
        }));
    }
    if flow.selected().is_empty() {
        println!("No users selected.");
    } else if flow.conflicts().is_empty() {
        println!(
            "No conflicts: {} user(s) can be assigned to the {} slot.",
            flow.selected().len(),
            flow.slot()
        );
    } else {
        println!(
            "{} of {} user(s) already have an active {} protocol:",
            flow.conflicts().len(),
            flow.selected().len(),
            flow.slot()
        );
        for line in summary {
            println!("  {line}");
        }
    }
    Ok(())
}

fn assign(
    root: &Path,
    user: &str,
    protocol: &str,
    targets: Targets,
    override_conflicts: bool,
    json: bool,
) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    let mut flow = checked_flow(&ws, protocol, targets)?;
    flow.set_override(override_conflicts);
    if !flow.can_assign() {
        if flow.selected().is_empty() {
            bail!("select at least one --user or --group");
        }
        for line in conflict_summary(flow.conflicts()) {
            eprintln!("  {line}");
        }
        bail!(
            "{} user(s) already have an active {} protocol; rerun with --override to replace it",
            flow.conflicts().len(),
            flow.slot()
        );
    }

    let request = AssignRequest {
        user_ids: flow.selected().to_vec(),
        group_ids: Vec::new(),
        slot: flow.slot(),
        override_conflicts: flow.override_conflicts(),
    };
    let outcome = ws
        .store
        .assign_protocol(&ws.actor, protocol, &request)
        .context("assignment failed")?;
    flow.finish(Ok(&outcome));

    if json {
        print_json(&outcome)?;
    } else {
        println!(
            "Assigned {} user(s), {} failed.",
            outcome.success, outcome.failed
        );
        for r in outcome.results.iter().filter(|r| !r.success) {
            println!("  {}: {}", r.user_id, r.error.as_deref().unwrap_or("unknown error"));
        }
    }
    Ok(())
}

fn list(root: &Path, user: &str, protocol: &str, all: bool, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    let rows = ws.store.list_assigned_users(&ws.actor, protocol, all)?;
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No assignments.");
        return Ok(());
    }
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.assignment_id.clone(),
                r.display_name.clone().unwrap_or_else(|| r.user_id.clone()),
                r.slot.to_string(),
                r.status.to_string(),
                or_dash(r.current_week),
                or_dash(r.current_day),
                format!("{}%", r.progress_percent),
            ]
        })
        .collect();
    print_table(
        &["ASSIGNMENT", "LEARNER", "SLOT", "STATUS", "WEEK", "DAY", "PROGRESS"],
        table,
    );
    Ok(())
}

fn abandon(root: &Path, user: &str, assignment: &str, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    let a = ws
        .store
        .abandon_assignment(&ws.actor, assignment)
        .with_context(|| format!("failed to abandon '{assignment}'"))?;
    if json {
        return print_json(&a);
    }
    println!("Abandoned {} for {}", a.id, a.user_id);
    Ok(())
}

fn progress(
    root: &Path,
    user: &str,
    assignment: &str,
    week: u32,
    day: u32,
    json: bool,
) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    let a = ws
        .store
        .update_progress(&ws.actor, assignment, week, day)
        .with_context(|| format!("failed to record progress on '{assignment}'"))?;
    if json {
        return print_json(&a);
    }
    println!("{} is at week {week} day {day} ({})", a.user_id, a.status);
    Ok(())
}
