//! Users and custom groups, the sources assignment targets resolve against.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{new_id, now, parse_col, placeholders, ts_col, Store};
use crate::error::{CoachError, Result};
use crate::types::{Actor, Tier};
use crate::visibility::MembershipLookup;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: String,
    pub member_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// Insert or update a user; the original `created_at` is kept.
    pub fn upsert_user(&self, actor: &Actor, user: NewUser) -> Result<User> {
        let id = user.id.trim();
        if id.is_empty() {
            return Err(CoachError::validation("id", "user id is required"));
        }
        if user.display_name.trim().is_empty() {
            return Err(CoachError::validation("display_name", "display name is required"));
        }
        let conn = self.lock();
        conn.execute(
            "INSERT INTO users (id, product_id, display_name, email, tier, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(product_id, id) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email,
                tier = excluded.tier",
            params![
                id,
                actor.product_id,
                user.display_name.trim(),
                user.email,
                user.tier.as_str(),
                now()
            ],
        )?;
        get_user(&conn, &actor.product_id, id)
    }

    pub fn get_user(&self, actor: &Actor, user_id: &str) -> Result<User> {
        let conn = self.lock();
        get_user(&conn, &actor.product_id, user_id)
    }

    pub fn list_users(&self, actor: &Actor) -> Result<Vec<User>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, display_name, email, tier, created_at FROM users
             WHERE product_id = ?1 ORDER BY display_name, id",
        )?;
        let rows = stmt.query_map([&actor.product_id], user_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Ids of users holding any of `tiers`.
    pub fn users_in_tiers(&self, actor: &Actor, tiers: &[Tier]) -> Result<Vec<String>> {
        if tiers.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock();
        let sql = format!(
            "SELECT id FROM users WHERE product_id = ?1 AND tier IN ({}) ORDER BY id",
            placeholders(tiers.len(), 1)
        );
        let mut stmt = conn.prepare(&sql)?;
        let bound = std::iter::once(actor.product_id.as_str()).chain(tiers.iter().map(|t| t.as_str()));
        let rows = stmt.query_map(params_from_iter(bound), |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    pub fn create_group(&self, actor: &Actor, name: &str, description: &str) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoachError::validation("name", "group name is required"));
        }
        let conn = self.lock();
        let taken: Option<String> = conn
            .query_row(
                "SELECT id FROM groups WHERE product_id = ?1 AND name = ?2",
                params![actor.product_id, name],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(CoachError::validation(
                "name",
                format!("a group named '{name}' already exists"),
            ));
        }
        let id = new_id();
        conn.execute(
            "INSERT INTO groups (id, product_id, name, description, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, actor.product_id, name, description, actor.user_id, now()],
        )?;
        info!(group = %id, name, "created group");
        get_group(&conn, &actor.product_id, &id)
    }

    pub fn list_groups(&self, actor: &Actor) -> Result<Vec<Group>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("{GROUP_SELECT} WHERE g.product_id = ?1 ORDER BY g.name"))?;
        let rows = stmt.query_map([&actor.product_id], group_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Add a user to a group. Returns `false` if they were already a member.
    pub fn add_group_member(&self, actor: &Actor, group_id: &str, user_id: &str) -> Result<bool> {
        let conn = self.lock();
        get_group(&conn, &actor.product_id, group_id)?;
        get_user(&conn, &actor.product_id, user_id)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO group_members (group_id, user_id, added_at) VALUES (?1, ?2, ?3)",
            params![group_id, user_id, now()],
        )?;
        Ok(inserted > 0)
    }

    /// Members of a group in this product, in the order they were added.
    pub fn group_members_for(&self, actor: &Actor, group_id: &str) -> Result<Vec<String>> {
        let conn = self.lock();
        get_group(&conn, &actor.product_id, group_id)?;
        members(&conn, group_id)
    }

    /// Returns `false` if the user was not a member.
    pub fn remove_group_member(&self, actor: &Actor, group_id: &str, user_id: &str) -> Result<bool> {
        let conn = self.lock();
        get_group(&conn, &actor.product_id, group_id)?;
        let removed = conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id],
        )?;
        Ok(removed > 0)
    }
}

/// Group membership as seen from one product. Groups of other products
/// read as missing.
pub struct ProductMembers<'a> {
    store: &'a Store,
    product_id: &'a str,
}

impl Store {
    pub fn members_lookup<'a>(&'a self, actor: &'a Actor) -> ProductMembers<'a> {
        ProductMembers {
            store: self,
            product_id: &actor.product_id,
        }
    }
}

impl MembershipLookup for ProductMembers<'_> {
    fn group_members(&self, group_id: &str) -> Result<Vec<String>> {
        let conn = self.store.lock();
        get_group(&conn, self.product_id, group_id)?;
        members(&conn, group_id)
    }
}

/// The same lookup over a connection the caller already holds.
pub(crate) struct ConnLookup<'a> {
    pub(crate) conn: &'a Connection,
    pub(crate) product_id: &'a str,
}

impl MembershipLookup for ConnLookup<'_> {
    fn group_members(&self, group_id: &str) -> Result<Vec<String>> {
        get_group(self.conn, self.product_id, group_id)?;
        members(self.conn, group_id)
    }
}

fn members(conn: &Connection, group_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY added_at, user_id",
    )?;
    let rows = stmt.query_map([group_id], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        tier: parse_col(row, 3)?,
        created_at: ts_col(row, 4)?,
    })
}

fn get_user(conn: &Connection, product_id: &str, user_id: &str) -> Result<User> {
    conn.query_row(
        "SELECT id, display_name, email, tier, created_at FROM users
         WHERE product_id = ?1 AND id = ?2",
        params![product_id, user_id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| CoachError::UserNotFound(user_id.to_string()))
}

const GROUP_SELECT: &str = "SELECT g.id, g.name, g.description,
        (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id), g.created_at
     FROM groups g";

fn group_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        member_count: row.get(3)?,
        created_at: ts_col(row, 4)?,
    })
}

fn get_group(conn: &Connection, product_id: &str, group_id: &str) -> Result<Group> {
    conn.query_row(
        &format!("{GROUP_SELECT} WHERE g.id = ?1 AND g.product_id = ?2"),
        params![group_id, product_id],
        group_from_row,
    )
    .optional()?
    .ok_or_else(|| CoachError::GroupNotFound(group_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::{Targets, Visibility};

    fn actor() -> Actor {
        Actor::new("coach-1", "default")
    }

    fn add(store: &Store, id: &str, tier: Tier) {
        store
            .upsert_user(
                &actor(),
                NewUser {
                    id: id.into(),
                    display_name: id.to_uppercase(),
                    email: None,
                    tier,
                },
            )
            .unwrap();
    }

    #[test]
    fn upsert_updates_in_place() {
        let store = Store::open_in_memory().unwrap();
        add(&store, "u1", Tier::Free);
        add(&store, "u1", Tier::Premium);
        let users = store.list_users(&actor()).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].tier, Tier::Premium);
    }

    #[test]
    fn tier_lookup_filters() {
        let store = Store::open_in_memory().unwrap();
        add(&store, "a", Tier::Free);
        add(&store, "b", Tier::Premium);
        add(&store, "c", Tier::Admin);
        let ids = store
            .users_in_tiers(&actor(), &[Tier::Premium, Tier::Admin])
            .unwrap();
        assert_eq!(ids, ["b", "c"]);
        assert!(store.users_in_tiers(&actor(), &[]).unwrap().is_empty());
    }

    #[test]
    fn group_membership_drives_visibility_targets() {
        let store = Store::open_in_memory().unwrap();
        for id in ["a", "b", "c"] {
            add(&store, id, Tier::Basic);
        }
        let g1 = store.create_group(&actor(), "mornings", "").unwrap();
        let g2 = store.create_group(&actor(), "evenings", "").unwrap();
        store.add_group_member(&actor(), &g1.id, "a").unwrap();
        store.add_group_member(&actor(), &g1.id, "b").unwrap();
        store.add_group_member(&actor(), &g2.id, "b").unwrap();
        store.add_group_member(&actor(), &g2.id, "c").unwrap();
        assert!(!store.add_group_member(&actor(), &g2.id, "c").unwrap());

        let v = Visibility::CustomGroup {
            group_ids: vec![g1.id.clone(), g2.id.clone()],
        };
        assert_eq!(
            v.resolve_targets(&store.members_lookup(&actor())).unwrap(),
            Targets::Users {
                user_ids: vec!["a".into(), "b".into(), "c".into()]
            }
        );
    }

    #[test]
    fn duplicate_group_name_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        store.create_group(&actor(), "cohort", "").unwrap();
        let err = store.create_group(&actor(), " cohort ", "").unwrap_err();
        assert!(matches!(err, CoachError::Validation { ref field, .. } if field == "name"));
    }

    #[test]
    fn membership_needs_known_user_and_group() {
        let store = Store::open_in_memory().unwrap();
        add(&store, "a", Tier::Free);
        let g = store.create_group(&actor(), "g", "").unwrap();
        assert!(matches!(
            store.add_group_member(&actor(), &g.id, "ghost"),
            Err(CoachError::UserNotFound(_))
        ));
        assert!(matches!(
            store.group_members_for(&actor(), "missing"),
            Err(CoachError::GroupNotFound(_))
        ));
        store.add_group_member(&actor(), &g.id, "a").unwrap();
        assert!(store.remove_group_member(&actor(), &g.id, "a").unwrap());
        assert!(store.group_members_for(&actor(), &g.id).unwrap().is_empty());
    }

    #[test]
    fn list_groups_counts_members() {
        let store = Store::open_in_memory().unwrap();
        add(&store, "a", Tier::Free);
        let g = store.create_group(&actor(), "g", "desc").unwrap();
        store.add_group_member(&actor(), &g.id, "a").unwrap();
        let groups = store.list_groups(&actor()).unwrap();
        assert_eq!(groups[0].member_count, 1);
        assert_eq!(groups[0].description, "desc");
    }

    #[test]
    fn members_are_scoped_to_product() {
        let store = Store::open_in_memory().unwrap();
        add(&store, "a", Tier::Free);
        let g = store.create_group(&actor(), "g", "").unwrap();
        store.add_group_member(&actor(), &g.id, "a").unwrap();
        assert_eq!(store.group_members_for(&actor(), &g.id).unwrap(), ["a"]);
        let outsider = Actor::new("coach-2", "other");
        assert!(matches!(
            store.group_members_for(&outsider, &g.id),
            Err(CoachError::GroupNotFound(_))
        ));
    }
}
