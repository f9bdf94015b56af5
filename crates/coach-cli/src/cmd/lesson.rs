use super::Workspace;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use coach_core::store::Tactic;
use std::path::Path;

#[derive(Subcommand)]
pub enum LessonSubcommand {
    /// Create a lesson
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List lessons
    List,
    /// Append a tactic to a lesson
    AddTactic {
        lesson: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List a lesson's tactics in order
    Tactics { lesson: String },
    /// Move the tactic at position FROM to position TO (1-based)
    Reorder {
        lesson: String,
        #[arg(long)]
        from: usize,
        #[arg(long)]
        to: usize,
    },
}

pub fn run(root: &Path, user: &str, subcmd: LessonSubcommand, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    match subcmd {
        LessonSubcommand::Create { title, description } => {
            let lesson = ws.store.create_lesson(&ws.actor, &title, &description)?;
            if json {
                return print_json(&lesson);
            }
            println!("Created lesson {} ({})", lesson.title, lesson.id);
        }
        LessonSubcommand::List => {
            let lessons = ws.store.list_lessons(&ws.actor)?;
            if json {
                return print_json(&lessons);
            }
            let rows = lessons.into_iter().map(|l| vec![l.id, l.title]).collect();
            print_table(&["ID", "TITLE"], rows);
        }
        LessonSubcommand::AddTactic {
            lesson,
            title,
            description,
        } => {
            let tactic = ws.store.add_tactic(&ws.actor, &lesson, &title, &description)?;
            if json {
                return print_json(&tactic);
            }
            println!("Added tactic {} at position {}", tactic.title, tactic.tactic_order);
        }
        LessonSubcommand::Tactics { lesson } => {
            let tactics = ws.store.list_tactics(&ws.actor, &lesson)?;
            print_tactics(&tactics, json)?;
        }
        LessonSubcommand::Reorder { lesson, from, to } => {
            if from == 0 || to == 0 {
                anyhow::bail!("positions start at 1");
            }
            let tactics = ws
                .store
                .reorder_tactics(&ws.actor, &lesson, from - 1, to - 1)
                .context("reorder was not saved; order is unchanged")?;
            print_tactics(&tactics, json)?;
        }
    }
    Ok(())
}

fn print_tactics(tactics: &[Tactic], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&tactics);
    }
    let rows = tactics
        .iter()
        .map(|t| vec![t.tactic_order.to_string(), t.id.clone(), t.title.clone()])
        .collect();
    print_table(&["#", "ID", "TITLE"], rows);
    Ok(())
}
