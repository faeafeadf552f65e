//! Shared store façade
//!
//! Bundles the SQLite database with the change hub so that every mutating
//! seat operation emits its matching notification. Each `Arc<SharedStore>`
//! clone acts as one independent client of the venue; the only coordination
//! between clients is the conditional update inside the storage layer.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;
use usher_core::{Database, Room, Seat};
use uuid::Uuid;

use crate::error::Result;
use crate::hub::{ChangeHub, ChangeKind, PeerMeta, PresenceEvent, PresenceHandle};
use tokio::sync::broadcast;

pub struct SharedStore {
    db: Mutex<Database>,
    hub: ChangeHub,
}

impl SharedStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            hub: ChangeHub::new(),
        }
    }

    /// In-memory venue (tests, demos)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn hub(&self) -> &ChangeHub {
        &self.hub
    }

    // -- Rooms ------------------------------------------------------------

    pub fn create_room(&self, room: &Room) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.rooms().create(room)?;
        Ok(())
    }

    pub fn find_room(&self, room_id: Uuid) -> Result<Option<Room>> {
        let db = self.db.lock().unwrap();
        Ok(db.rooms().find_by_id(room_id)?)
    }

    pub fn provision_seats(&self, room_id: Uuid, seats_per_row: &[u32]) -> Result<Vec<Seat>> {
        let db = self.db.lock().unwrap();
        Ok(db.seats().provision_grid(room_id, seats_per_row)?)
    }

    // -- Seats ------------------------------------------------------------

    /// Full ordered read of a room's seats
    pub fn list_seats(&self, room_id: Uuid) -> Result<Vec<Seat>> {
        let db = self.db.lock().unwrap();
        let seats = db.seats().list_for_room(room_id)?;
        usher_core::invariants::assert_room_seating_invariants(&seats);
        Ok(seats)
    }

    pub fn find_seat_for_user(&self, room_id: Uuid, user_id: Uuid) -> Result<Option<Seat>> {
        let db = self.db.lock().unwrap();
        Ok(db.seats().find_for_user(room_id, user_id)?)
    }

    /// Conditional claim; emits a change notification only when the claim won
    pub fn claim_seat_if_vacant(&self, room_id: Uuid, seat_id: Uuid, user_id: Uuid) -> Result<bool> {
        let claimed = {
            let db = self.db.lock().unwrap();
            db.seats().claim_if_vacant(seat_id, user_id, Utc::now())?
        };
        if claimed {
            self.hub.notify_seats(room_id, ChangeKind::Claimed);
        }
        Ok(claimed)
    }

    /// Idempotent release; notifies only when a row actually changed
    pub fn release_seats_for_user(&self, room_id: Uuid, user_id: Uuid) -> Result<u64> {
        let released = {
            let db = self.db.lock().unwrap();
            db.seats().release_for_user(room_id, user_id)?
        };
        if released > 0 {
            self.hub.notify_seats(room_id, ChangeKind::Released);
        }
        Ok(released)
    }

    /// Bulk reclaim of abandoned seats; notifies only when something cleared
    pub fn reclaim_abandoned_seats(&self, room_id: Uuid, cutoff: DateTime<Utc>) -> Result<u64> {
        let reclaimed = {
            let db = self.db.lock().unwrap();
            db.seats().reclaim_abandoned(room_id, cutoff)?
        };
        if reclaimed > 0 {
            debug!(room_id = %room_id, reclaimed, "Reclaimed abandoned seats");
            self.hub.notify_seats(room_id, ChangeKind::Reclaimed);
        }
        Ok(reclaimed)
    }

    // -- Notifications & presence -----------------------------------------

    pub fn subscribe_seats(&self, room_id: Uuid) -> broadcast::Receiver<crate::hub::SeatChange> {
        self.hub.subscribe_seats(room_id)
    }

    pub fn join_presence(
        &self,
        room_id: Uuid,
        meta: PeerMeta,
    ) -> (PresenceHandle, broadcast::Receiver<PresenceEvent>) {
        self.hub.join_presence(room_id, meta)
    }
}
