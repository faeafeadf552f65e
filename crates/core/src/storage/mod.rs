//! SQLite storage layer for Usher

mod migrations;
mod parse;
mod rooms;
mod seats;
mod traits;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Room, Seat};
use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;

pub use rooms::RoomStore;
pub use seats::SeatStore;
pub use traits::{RoomRepository, SeatRepository, Storage};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Get room store
    pub fn rooms(&self) -> RoomStore<'_> {
        RoomStore::new(&self.conn)
    }

    /// Get seat store
    pub fn seats(&self) -> SeatStore<'_> {
        SeatStore::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl RoomRepository for Database {
    fn create_room(&self, room: &Room) -> Result<()> {
        self.rooms().create(room)
    }

    fn find_room_by_id(&self, id: Uuid) -> Result<Option<Room>> {
        self.rooms().find_by_id(id)
    }

    fn list_open_rooms(&self) -> Result<Vec<Room>> {
        self.rooms().list_open()
    }

    fn update_room(&self, room: &Room) -> Result<()> {
        self.rooms().update(room)
    }

    fn set_room_open(&self, room_id: Uuid, is_open: bool) -> Result<()> {
        self.rooms().set_open(room_id, is_open)
    }
}

impl SeatRepository for Database {
    fn provision_seats(&self, room_id: Uuid, seats_per_row: &[u32]) -> Result<Vec<Seat>> {
        self.seats().provision_grid(room_id, seats_per_row)
    }

    fn list_seats(&self, room_id: Uuid) -> Result<Vec<Seat>> {
        self.seats().list_for_room(room_id)
    }

    fn find_seat_for_user(&self, room_id: Uuid, user_id: Uuid) -> Result<Option<Seat>> {
        self.seats().find_for_user(room_id, user_id)
    }

    fn claim_seat_if_vacant(
        &self,
        seat_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.seats().claim_if_vacant(seat_id, user_id, now)
    }

    fn release_seats_for_user(&self, room_id: Uuid, user_id: Uuid) -> Result<u64> {
        self.seats().release_for_user(room_id, user_id)
    }

    fn reclaim_abandoned_seats(&self, room_id: Uuid, cutoff: DateTime<Utc>) -> Result<u64> {
        self.seats().reclaim_abandoned(room_id, cutoff)
    }
}
