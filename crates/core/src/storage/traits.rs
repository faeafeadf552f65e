//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, mock, future remote store).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Room, Seat};

/// Room repository operations
pub trait RoomRepository {
    /// Create a new Room
    fn create_room(&self, room: &Room) -> Result<()>;

    /// Find Room by ID
    fn find_room_by_id(&self, id: Uuid) -> Result<Option<Room>>;

    /// List all open rooms
    fn list_open_rooms(&self) -> Result<Vec<Room>>;

    /// Update a Room
    fn update_room(&self, room: &Room) -> Result<()>;

    /// Open or close a room
    fn set_room_open(&self, room_id: Uuid, is_open: bool) -> Result<()>;
}

/// Seat repository operations
pub trait SeatRepository {
    /// Provision the seat grid for a room
    fn provision_seats(&self, room_id: Uuid, seats_per_row: &[u32]) -> Result<Vec<Seat>>;

    /// List all seats in a room in deterministic (row, number) order
    fn list_seats(&self, room_id: Uuid) -> Result<Vec<Seat>>;

    /// Find the seat a user holds in a room
    fn find_seat_for_user(&self, room_id: Uuid, user_id: Uuid) -> Result<Option<Seat>>;

    /// Conditionally claim a seat; false means the claim lost a race
    fn claim_seat_if_vacant(
        &self,
        seat_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Release every seat a user holds in a room; idempotent
    fn release_seats_for_user(&self, room_id: Uuid, user_id: Uuid) -> Result<u64>;

    /// Reclaim seats occupied since before the cutoff
    fn reclaim_abandoned_seats(&self, room_id: Uuid, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Combined storage interface
///
/// Provides access to all repository operations.
/// Implementations may be backed by SQLite, mocks, or a remote store.
pub trait Storage: RoomRepository + SeatRepository {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: RoomRepository + SeatRepository {}
