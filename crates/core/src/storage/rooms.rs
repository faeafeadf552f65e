//! Room storage operations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{access_level, timestamp_text, uuid_text};
use crate::error::Result;
use crate::models::Room;

pub struct RoomStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoomStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new Room
    #[instrument(skip(self, room), fields(room_name = %room.name))]
    pub fn create(&self, room: &Room) -> Result<()> {
        self.conn.execute(
            "INSERT INTO rooms (id, name, media_ref, is_open, access_level, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                room.id.to_string(),
                room.name,
                room.media_ref,
                room.is_open as i32,
                room.access_level as u8,
                room.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find Room by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Room>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, media_ref, is_open, access_level, created_at
             FROM rooms WHERE id = ?1",
        )?;

        let room = stmt
            .query_row(params![id.to_string()], |row| {
                Ok(Room {
                    id: uuid_text(0, row.get(0)?)?,
                    name: row.get(1)?,
                    media_ref: row.get(2)?,
                    is_open: row.get::<_, i32>(3)? != 0,
                    access_level: access_level(row.get(4)?),
                    created_at: timestamp_text(5, row.get(5)?)?,
                })
            })
            .optional()?;

        Ok(room)
    }

    /// List all open rooms
    #[instrument(skip(self))]
    pub fn list_open(&self) -> Result<Vec<Room>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, media_ref, is_open, access_level, created_at
             FROM rooms WHERE is_open = 1
             ORDER BY name",
        )?;

        let rooms = stmt
            .query_map([], |row| {
                Ok(Room {
                    id: uuid_text(0, row.get(0)?)?,
                    name: row.get(1)?,
                    media_ref: row.get(2)?,
                    is_open: row.get::<_, i32>(3)? != 0,
                    access_level: access_level(row.get(4)?),
                    created_at: timestamp_text(5, row.get(5)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rooms)
    }

    /// Update Room metadata
    #[instrument(skip(self, room), fields(room_id = %room.id))]
    pub fn update(&self, room: &Room) -> Result<()> {
        self.conn.execute(
            "UPDATE rooms SET name = ?1, media_ref = ?2, is_open = ?3, access_level = ?4
             WHERE id = ?5",
            params![
                room.name,
                room.media_ref,
                room.is_open as i32,
                room.access_level as u8,
                room.id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Open or close a room
    #[instrument(skip(self))]
    pub fn set_open(&self, room_id: Uuid, is_open: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE rooms SET is_open = ?1 WHERE id = ?2",
            params![is_open as i32, room_id.to_string()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccessLevel;
    use crate::storage::Database;

    #[test]
    fn test_create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let room = Room::new("Screen One".to_string()).with_media_ref("film-42".to_string());
        db.rooms().create(&room).unwrap();

        let found = db.rooms().find_by_id(room.id).unwrap().unwrap();
        assert_eq!(found.name, "Screen One");
        assert_eq!(found.media_ref.as_deref(), Some("film-42"));
        assert!(found.is_open);
    }

    #[test]
    fn test_list_open_excludes_closed() {
        let db = Database::open_in_memory().unwrap();

        let open = Room::new("Open".to_string());
        let closed = Room::new("Closed".to_string());
        db.rooms().create(&open).unwrap();
        db.rooms().create(&closed).unwrap();
        db.rooms().set_open(closed.id, false).unwrap();

        let rooms = db.rooms().list_open().unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].id, open.id);
    }

    #[test]
    fn test_access_level_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let room = Room::new("Vip Lounge".to_string()).with_access_level(AccessLevel::Vip);
        db.rooms().create(&room).unwrap();

        let found = db.rooms().find_by_id(room.id).unwrap().unwrap();
        assert_eq!(found.access_level, AccessLevel::Vip);
    }
}
