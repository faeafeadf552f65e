//! Schema migrations
//!
//! Migrations run sequentially on open; each applied version is recorded in
//! `schema_migrations`, so reopening an up-to-date database is a no-op.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Rooms are operator-managed; this layer mostly reads them
            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                media_ref TEXT,
                is_open INTEGER NOT NULL DEFAULT 1,
                access_level INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            -- occupant and occupied_since are set/cleared together,
            -- only ever through the conditional claim/release statements
            CREATE TABLE IF NOT EXISTS seats (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                row INTEGER NOT NULL,
                number INTEGER NOT NULL,
                occupant TEXT,
                occupied_since TEXT,
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE,
                UNIQUE(room_id, row, number)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Indexes for seat lookups",
        sql: r#"
            -- Room scans ordered by (row, number)
            CREATE INDEX IF NOT EXISTS idx_seats_room ON seats(room_id, row, number);

            -- Occupant lookups for release and the one-seat-per-user check
            CREATE INDEX IF NOT EXISTS idx_seats_occupant ON seats(room_id, occupant);

            -- Abandonment sweep filter
            CREATE INDEX IF NOT EXISTS idx_seats_occupied_since ON seats(room_id, occupied_since);
        "#,
    },
];

/// Apply every migration newer than the recorded version
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let applied = current_version(conn)?;
    debug!(applied, "Checking schema version");

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        conn.execute_batch(migration.sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, description, applied_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        info!(
            version = migration.version,
            description = migration.description,
            "Applied migration"
        );
    }

    Ok(())
}

fn current_version(conn: &Connection) -> Result<u32> {
    // schema_migrations always exists here; MAX over zero rows is NULL
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}
