//! Lessons and their ordered tactics.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use super::{new_id, now, ts_col, Store};
use crate::error::{CoachError, Result};
use crate::reorder::{self, Ordered};
use crate::types::Actor;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tactic {
    pub id: String,
    pub lesson_id: String,
    pub title: String,
    pub description: String,
    pub tactic_order: u32,
}

impl Ordered for Tactic {
    fn set_order(&mut self, order: u32) {
        self.tactic_order = order;
    }
}

impl Store {
    pub fn create_lesson(&self, actor: &Actor, title: &str, description: &str) -> Result<Lesson> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoachError::validation("title", "lesson title is required"));
        }
        let conn = self.lock();
        let id = new_id();
        conn.execute(
            "INSERT INTO lessons (id, product_id, title, description, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, actor.product_id, title, description, actor.user_id, now()],
        )?;
        get_lesson(&conn, &actor.product_id, &id)
    }

    pub fn list_lessons(&self, actor: &Actor) -> Result<Vec<Lesson>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, title, description, created_at FROM lessons
             WHERE product_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map([&actor.product_id], lesson_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Append a tactic at the end of the lesson.
    pub fn add_tactic(&self, actor: &Actor, lesson_id: &str, title: &str, description: &str) -> Result<Tactic> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoachError::validation("title", "tactic title is required"));
        }
        let conn = self.lock();
        get_lesson(&conn, &actor.product_id, lesson_id)?;
        let next: u32 = conn.query_row(
            "SELECT COALESCE(MAX(tactic_order), 0) + 1 FROM tactics WHERE lesson_id = ?1",
            [lesson_id],
            |row| row.get(0),
        )?;
        let tactic = Tactic {
            id: new_id(),
            lesson_id: lesson_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            tactic_order: next,
        };
        conn.execute(
            "INSERT INTO tactics (id, lesson_id, title, description, tactic_order)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![tactic.id, tactic.lesson_id, tactic.title, tactic.description, tactic.tactic_order],
        )?;
        Ok(tactic)
    }

    pub fn list_tactics(&self, actor: &Actor, lesson_id: &str) -> Result<Vec<Tactic>> {
        let conn = self.lock();
        get_lesson(&conn, &actor.product_id, lesson_id)?;
        tactics(&conn, lesson_id)
    }

    /// Write a full ordering. `ordered_ids` must name every tactic of the
    /// lesson exactly once.
    pub fn persist_tactic_order(&self, actor: &Actor, lesson_id: &str, ordered_ids: &[String]) -> Result<()> {
        let mut conn = self.lock();
        get_lesson(&conn, &actor.product_id, lesson_id)?;
        let current = tactics(&conn, lesson_id)?;

        let mut expected: Vec<&str> = current.iter().map(|t| t.id.as_str()).collect();
        let mut given: Vec<&str> = ordered_ids.iter().map(String::as_str).collect();
        expected.sort_unstable();
        given.sort_unstable();
        if expected != given {
            return Err(CoachError::validation(
                "order",
                "new order must list every tactic of the lesson exactly once",
            ));
        }

        let tx = conn.transaction()?;
        for (i, id) in ordered_ids.iter().enumerate() {
            tx.execute(
                "UPDATE tactics SET tactic_order = ?1 WHERE id = ?2",
                params![i as u32 + 1, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Move one tactic (0-based positions) and persist. On failure the
    /// returned error is the persist error and the stored order is unchanged.
    pub fn reorder_tactics(&self, actor: &Actor, lesson_id: &str, from: usize, to: usize) -> Result<Vec<Tactic>> {
        let mut list = self.list_tactics(actor, lesson_id)?;
        reorder::apply_optimistic(&mut list, from, to, |moved| {
            let ids: Vec<String> = moved.iter().map(|t| t.id.clone()).collect();
            self.persist_tactic_order(actor, lesson_id, &ids)
        })?;
        info!(lesson = %lesson_id, from, to, "reordered tactics");
        Ok(list)
    }
}

fn lesson_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        created_at: ts_col(row, 3)?,
    })
}

fn get_lesson(conn: &Connection, product_id: &str, lesson_id: &str) -> Result<Lesson> {
    conn.query_row(
        "SELECT id, title, description, created_at FROM lessons WHERE id = ?1 AND product_id = ?2",
        params![lesson_id, product_id],
        lesson_from_row,
    )
    .optional()?
    .ok_or_else(|| CoachError::LessonNotFound(lesson_id.to_string()))
}

fn tactics(conn: &Connection, lesson_id: &str) -> Result<Vec<Tactic>> {
    let mut stmt = conn.prepare(
        "SELECT id, lesson_id, title, description, tactic_order FROM tactics
         WHERE lesson_id = ?1 ORDER BY tactic_order, id",
    )?;
    let rows = stmt.query_map([lesson_id], |row| {
        Ok(Tactic {
            id: row.get(0)?,
            lesson_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            tactic_order: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
