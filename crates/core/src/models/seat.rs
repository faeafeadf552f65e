//! Seat model - an exclusive occupancy slot within a room

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::layout::SeatPosition;

/// A Seat belongs to exactly one Room and holds at most one occupant.
///
/// `occupant` and `occupied_since` are always set or cleared together.
/// Occupancy is mutated exclusively through the conditional claim/release
/// operations in the storage layer; seat rows themselves are provisioned
/// when the room is created and never deleted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub room_id: Uuid,
    /// Row index, 1-based
    pub row: u32,
    /// Seat index within the row, 1-based
    pub number: u32,
    pub occupant: Option<Uuid>,
    pub occupied_since: Option<DateTime<Utc>>,
}

impl Seat {
    pub fn new(room_id: Uuid, row: u32, number: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            row,
            number,
            occupant: None,
            occupied_since: None,
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.occupant.is_none()
    }

    pub fn is_held_by(&self, user_id: Uuid) -> bool {
        self.occupant == Some(user_id)
    }
}

/// Client-local record of the seat a user believes it holds.
///
/// Avoids redundant remote reads and drives movement logic; must always be
/// reconcilable against the authoritative seat row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeatClaim {
    pub seat_id: Uuid,
    pub position: SeatPosition,
}
