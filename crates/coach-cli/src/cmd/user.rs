use super::Workspace;
use crate::output::{or_dash, print_json, print_table};
use clap::Subcommand;
use coach_core::store::NewUser;
use coach_core::types::Tier;
use std::path::Path;

#[derive(Subcommand)]
pub enum UserSubcommand {
    /// Add a learner, or update one with the same id
    Add {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value = "free")]
        tier: Tier,
    },
    /// List learners
    List,
    /// Show a learner's assignments
    Assignments { id: String },
}

pub fn run(root: &Path, user: &str, subcmd: UserSubcommand, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    match subcmd {
        UserSubcommand::Add {
            id,
            name,
            email,
            tier,
        } => {
            let saved = ws.store.upsert_user(
                &ws.actor,
                NewUser {
                    id,
                    display_name: name,
                    email,
                    tier,
                },
            )?;
            if json {
                return print_json(&saved);
            }
            println!("Saved user {} ({}, {})", saved.id, saved.display_name, saved.tier);
        }
        UserSubcommand::List => {
            let users = ws.store.list_users(&ws.actor)?;
            if json {
                return print_json(&users);
            }
            let rows = users
                .into_iter()
                .map(|u| vec![u.id, u.display_name, or_dash(u.email), u.tier.to_string()])
                .collect();
            print_table(&["ID", "NAME", "EMAIL", "TIER"], rows);
        }
        UserSubcommand::Assignments { id } => {
            ws.store.get_user(&ws.actor, &id)?;
            let assignments = ws.store.user_assignments(&ws.actor, &id)?;
            if json {
                return print_json(&assignments);
            }
            let rows = assignments
                .into_iter()
                .map(|a| {
                    vec![
                        a.id,
                        a.protocol_id,
                        a.slot.to_string(),
                        a.status.to_string(),
                        or_dash(a.current_week),
                        or_dash(a.current_day),
                    ]
                })
                .collect();
            print_table(&["ASSIGNMENT", "PROTOCOL", "SLOT", "STATUS", "WEEK", "DAY"], rows);
        }
    }
    Ok(())
}
