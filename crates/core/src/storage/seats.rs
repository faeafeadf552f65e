//! Seat storage operations
//!
//! Occupancy is mutated only through the conditional statements here. The
//! claim predicate (`occupant IS NULL`) is part of the atomic UPDATE, so the
//! affected-row count is the compare-and-swap outcome; no other locking is
//! used anywhere in the system.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{timestamp_text_opt, uuid_text, uuid_text_opt};
use crate::error::Result;
use crate::models::Seat;

pub struct SeatStore<'a> {
    conn: &'a Connection,
}

const SEAT_COLUMNS: &str = "id, room_id, row, number, occupant, occupied_since";

fn seat_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<Seat, rusqlite::Error> {
    Ok(Seat {
        id: uuid_text(0, row.get(0)?)?,
        room_id: uuid_text(1, row.get(1)?)?,
        row: row.get(2)?,
        number: row.get(3)?,
        occupant: uuid_text_opt(4, row.get(4)?)?,
        occupied_since: timestamp_text_opt(5, row.get(5)?)?,
    })
}

impl<'a> SeatStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Provision the seat grid for a room.
    ///
    /// `seats_per_row[i]` is the seat count of row `i + 1`. Runs once when a
    /// room is created; seat rows are never deleted afterwards.
    #[instrument(skip(self))]
    pub fn provision_grid(&self, room_id: Uuid, seats_per_row: &[u32]) -> Result<Vec<Seat>> {
        let mut seats = Vec::new();
        for (i, &count) in seats_per_row.iter().enumerate() {
            for number in 1..=count {
                let seat = Seat::new(room_id, i as u32 + 1, number);
                self.conn.execute(
                    "INSERT INTO seats (id, room_id, row, number, occupant, occupied_since)
                     VALUES (?1, ?2, ?3, ?4, NULL, NULL)",
                    params![
                        seat.id.to_string(),
                        room_id.to_string(),
                        seat.row,
                        seat.number,
                    ],
                )?;
                seats.push(seat);
            }
        }
        Ok(seats)
    }

    /// List all seats in a room, lowest row then lowest number first.
    ///
    /// This ordering also defines the deterministic candidate order for
    /// claim-any-seat.
    #[instrument(skip(self))]
    pub fn list_for_room(&self, room_id: Uuid) -> Result<Vec<Seat>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE room_id = ?1 ORDER BY row, number"
        ))?;

        let seats = stmt
            .query_map(params![room_id.to_string()], seat_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(seats)
    }

    /// Find a seat by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, seat_id: Uuid) -> Result<Option<Seat>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SEAT_COLUMNS} FROM seats WHERE id = ?1"))?;

        let seat = stmt
            .query_row(params![seat_id.to_string()], seat_from_row)
            .optional()?;

        Ok(seat)
    }

    /// Find the seat currently held by a user in a room
    #[instrument(skip(self))]
    pub fn find_for_user(&self, room_id: Uuid, user_id: Uuid) -> Result<Option<Seat>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE room_id = ?1 AND occupant = ?2"
        ))?;

        let seat = stmt
            .query_row(
                params![room_id.to_string(), user_id.to_string()],
                seat_from_row,
            )
            .optional()?;

        Ok(seat)
    }

    /// Conditionally claim a seat for a user.
    ///
    /// The write succeeds only if the seat is still vacant at write time.
    /// Returns false when another client won the race; that is an expected
    /// outcome, not an error.
    #[instrument(skip(self))]
    pub fn claim_if_vacant(&self, seat_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE seats SET occupant = ?1, occupied_since = ?2
             WHERE id = ?3 AND occupant IS NULL",
            params![user_id.to_string(), now.to_rfc3339(), seat_id.to_string()],
        )?;
        Ok(affected == 1)
    }

    /// Unconditionally release every seat a user holds in a room.
    ///
    /// Idempotent: releasing when not seated affects zero rows and is fine.
    /// Returns the number of seats cleared.
    #[instrument(skip(self))]
    pub fn release_for_user(&self, room_id: Uuid, user_id: Uuid) -> Result<u64> {
        let affected = self.conn.execute(
            "UPDATE seats SET occupant = NULL, occupied_since = NULL
             WHERE room_id = ?1 AND occupant = ?2",
            params![room_id.to_string(), user_id.to_string()],
        )?;
        Ok(affected as u64)
    }

    /// Clear every seat in a room whose occupancy has aged past `cutoff`.
    ///
    /// One conditional bulk update; RFC3339 UTC strings compare in timestamp
    /// order. Returns the number of seats reclaimed.
    #[instrument(skip(self))]
    pub fn reclaim_abandoned(&self, room_id: Uuid, cutoff: DateTime<Utc>) -> Result<u64> {
        let affected = self.conn.execute(
            "UPDATE seats SET occupant = NULL, occupied_since = NULL
             WHERE room_id = ?1 AND occupied_since IS NOT NULL AND occupied_since < ?2",
            params![room_id.to_string(), cutoff.to_rfc3339()],
        )?;
        Ok(affected as u64)
    }

    /// Count occupied seats in a room
    #[instrument(skip(self))]
    pub fn count_occupied(&self, room_id: Uuid) -> Result<u64> {
        let count: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM seats WHERE room_id = ?1 AND occupant IS NOT NULL",
            params![room_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Room;
    use crate::storage::Database;
    use chrono::Duration;
    use tempfile::tempdir;

    fn setup(seats_per_row: &[u32]) -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let room = Room::new("Test Room".to_string());
        db.rooms().create(&room).unwrap();
        db.seats().provision_grid(room.id, seats_per_row).unwrap();
        (db, room.id)
    }

    #[test]
    fn test_provision_and_ordering() {
        let (db, room_id) = setup(&[2, 3]);
        let seats = db.seats().list_for_room(room_id).unwrap();

        assert_eq!(seats.len(), 5);
        let slots: Vec<(u32, u32)> = seats.iter().map(|s| (s.row, s.number)).collect();
        assert_eq!(slots, vec![(1, 1), (1, 2), (2, 1), (2, 2), (2, 3)]);
        assert!(seats.iter().all(|s| s.is_vacant()));
    }

    #[test]
    fn test_conditional_claim_only_first_wins() {
        let (db, room_id) = setup(&[1]);
        let seat_id = db.seats().list_for_room(room_id).unwrap()[0].id;

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let now = Utc::now();

        assert!(db.seats().claim_if_vacant(seat_id, alice, now).unwrap());
        // Second claim fails the predicate; row is untouched
        assert!(!db.seats().claim_if_vacant(seat_id, bob, now).unwrap());

        let seat = db.seats().find_by_id(seat_id).unwrap().unwrap();
        assert_eq!(seat.occupant, Some(alice));
        assert!(seat.occupied_since.is_some());
    }

    #[test]
    fn test_release_is_idempotent() {
        let (db, room_id) = setup(&[2]);
        let user_id = Uuid::new_v4();

        // Not seated: no rows touched, no error
        assert_eq!(db.seats().release_for_user(room_id, user_id).unwrap(), 0);

        let seat_id = db.seats().list_for_room(room_id).unwrap()[0].id;
        db.seats()
            .claim_if_vacant(seat_id, user_id, Utc::now())
            .unwrap();

        assert_eq!(db.seats().release_for_user(room_id, user_id).unwrap(), 1);
        assert_eq!(db.seats().release_for_user(room_id, user_id).unwrap(), 0);

        let seat = db.seats().find_by_id(seat_id).unwrap().unwrap();
        assert!(seat.is_vacant());
        assert!(seat.occupied_since.is_none());
    }

    #[test]
    fn test_reclaim_respects_threshold() {
        let (db, room_id) = setup(&[2]);
        let seats = db.seats().list_for_room(room_id).unwrap();
        let stale_user = Uuid::new_v4();
        let fresh_user = Uuid::new_v4();

        let now = Utc::now();
        db.seats()
            .claim_if_vacant(seats[0].id, stale_user, now - Duration::minutes(31))
            .unwrap();
        db.seats()
            .claim_if_vacant(seats[1].id, fresh_user, now - Duration::minutes(10))
            .unwrap();

        let cutoff = now - Duration::minutes(30);
        assert_eq!(db.seats().reclaim_abandoned(room_id, cutoff).unwrap(), 1);

        let stale = db.seats().find_by_id(seats[0].id).unwrap().unwrap();
        let fresh = db.seats().find_by_id(seats[1].id).unwrap().unwrap();
        assert!(stale.is_vacant());
        assert_eq!(fresh.occupant, Some(fresh_user));
    }

    #[test]
    fn test_find_for_user() {
        let (db, room_id) = setup(&[1, 1]);
        let user_id = Uuid::new_v4();
        let seats = db.seats().list_for_room(room_id).unwrap();

        assert!(db.seats().find_for_user(room_id, user_id).unwrap().is_none());

        db.seats()
            .claim_if_vacant(seats[1].id, user_id, Utc::now())
            .unwrap();
        let held = db.seats().find_for_user(room_id, user_id).unwrap().unwrap();
        assert_eq!(held.id, seats[1].id);
    }

    #[test]
    fn test_on_disk_database() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("venue.db")).unwrap();

        let room = Room::new("Persisted".to_string());
        db.rooms().create(&room).unwrap();
        db.seats().provision_grid(room.id, &[4]).unwrap();

        assert_eq!(db.seats().list_for_room(room.id).unwrap().len(), 4);
    }
}
