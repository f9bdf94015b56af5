use super::Workspace;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum GroupSubcommand {
    /// Create a custom group
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List groups
    List,
    /// Add a user to a group
    AddMember { group: String, user: String },
    /// Remove a user from a group
    RemoveMember { group: String, user: String },
    /// List a group's members
    Members { group: String },
}

pub fn run(root: &Path, user: &str, subcmd: GroupSubcommand, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(root, user)?;
    match subcmd {
        GroupSubcommand::Create { name, description } => {
            let group = ws
                .store
                .create_group(&ws.actor, &name, &description)
                .with_context(|| format!("failed to create group '{name}'"))?;
            if json {
                return print_json(&group);
            }
            println!("Created group {} ({})", group.name, group.id);
        }
        GroupSubcommand::List => {
            let groups = ws.store.list_groups(&ws.actor)?;
            if json {
                return print_json(&groups);
            }
            let rows = groups
                .into_iter()
                .map(|g| vec![g.id, g.name, g.member_count.to_string()])
                .collect();
            print_table(&["ID", "NAME", "MEMBERS"], rows);
        }
        GroupSubcommand::AddMember { group, user } => {
            let added = ws.store.add_group_member(&ws.actor, &group, &user)?;
            if json {
                return print_json(&serde_json::json!({ "group": group, "user": user, "added": added }));
            }
            if added {
                println!("Added {user} to {group}");
            } else {
                println!("{user} is already in {group}");
            }
        }
        GroupSubcommand::RemoveMember { group, user } => {
            let removed = ws.store.remove_group_member(&ws.actor, &group, &user)?;
            if json {
                return print_json(&serde_json::json!({ "group": group, "user": user, "removed": removed }));
            }
            if removed {
                println!("Removed {user} from {group}");
            } else {
                println!("{user} is not in {group}");
            }
        }
        GroupSubcommand::Members { group } => {
            let members = ws.store.group_members_for(&ws.actor, &group)?;
            if json {
                return print_json(&members);
            }
            for m in members {
                println!("{m}");
            }
        }
    }
    Ok(())
}
