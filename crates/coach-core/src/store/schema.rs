//! Table definitions and version tracking.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::Result;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;
    let current = schema_version(conn)?;

    if current == 0 {
        info!("creating coach schema v{SCHEMA_VERSION}");
        conn.execute_batch(TENANT_SCHEMA)?;
        conn.execute_batch(PROTOCOL_SCHEMA)?;
        conn.execute_batch(ASSIGNMENT_SCHEMA)?;
        conn.execute_batch(LESSON_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current < SCHEMA_VERSION {
        info!("migrating coach schema from v{current} to v{SCHEMA_VERSION}");
        set_schema_version(conn, SCHEMA_VERSION)?;
    }
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i32> {
    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

const TENANT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    display_name TEXT NOT NULL,
    email TEXT,
    tier TEXT NOT NULL DEFAULT 'free',
    created_at TEXT NOT NULL,
    PRIMARY KEY (product_id, id)
);
CREATE INDEX IF NOT EXISTS idx_users_tier ON users(product_id, tier);

CREATE TABLE IF NOT EXISTS groups (
    id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (product_id, name)
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    added_at TEXT NOT NULL,
    PRIMARY KEY (group_id, user_id)
);
"#;

const PROTOCOL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS protocols (
    id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    visibility_mode TEXT NOT NULL DEFAULT 'all_users',
    visibility_config TEXT,
    schedule_type TEXT NOT NULL DEFAULT 'immediate',
    start_date TEXT,
    theme_color TEXT NOT NULL,
    total_weeks INTEGER NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_protocols_product ON protocols(product_id, updated_at);

CREATE TABLE IF NOT EXISTS protocol_weeks (
    protocol_id TEXT NOT NULL REFERENCES protocols(id) ON DELETE CASCADE,
    week_number INTEGER NOT NULL,
    theme TEXT NOT NULL,
    PRIMARY KEY (protocol_id, week_number)
);

CREATE TABLE IF NOT EXISTS protocol_tasks (
    id TEXT PRIMARY KEY,
    protocol_id TEXT NOT NULL REFERENCES protocols(id) ON DELETE CASCADE,
    week_number INTEGER NOT NULL CHECK (week_number >= 1),
    day_number INTEGER NOT NULL CHECK (day_number BETWEEN 1 AND 7),
    task_order INTEGER NOT NULL CHECK (task_order >= 1),
    title TEXT NOT NULL,
    instructions TEXT NOT NULL DEFAULT '',
    task_type TEXT NOT NULL,
    time_of_day TEXT NOT NULL,
    duration_minutes INTEGER,
    resource_url TEXT
);
CREATE INDEX IF NOT EXISTS idx_tasks_position
    ON protocol_tasks(protocol_id, week_number, day_number, task_order);
"#;

const ASSIGNMENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS assignments (
    id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    protocol_id TEXT NOT NULL REFERENCES protocols(id) ON DELETE CASCADE,
    assignment_slot TEXT NOT NULL,
    status TEXT NOT NULL,
    current_week INTEGER,
    current_day INTEGER,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    days_completed INTEGER NOT NULL DEFAULT 0,
    days_skipped INTEGER NOT NULL DEFAULT 0,
    assigned_by TEXT
);
CREATE INDEX IF NOT EXISTS idx_assignments_slot
    ON assignments(product_id, user_id, assignment_slot, status);
CREATE INDEX IF NOT EXISTS idx_assignments_protocol ON assignments(protocol_id);
"#;

const LESSON_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS lessons (
    id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tactics (
    id TEXT PRIMARY KEY,
    lesson_id TEXT NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    tactic_order INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tactics_lesson ON tactics(lesson_id, tactic_order);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_gets_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
