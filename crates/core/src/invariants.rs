//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible seating states during
//! development. These checks are compiled out in release builds.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::Seat;

/// Validate that a seat's occupancy fields agree
pub fn assert_seat_invariants(seat: &Seat) {
    // Occupant and timestamp are set or cleared together
    debug_assert!(
        seat.occupant.is_some() == seat.occupied_since.is_some(),
        "Seat {} has occupant {:?} but occupied_since {:?}",
        seat.id,
        seat.occupant,
        seat.occupied_since
    );

    debug_assert!(
        seat.row >= 1 && seat.number >= 1,
        "Seat {} has non-positive indices ({}, {})",
        seat.id,
        seat.row,
        seat.number
    );
}

/// Validate a room's full seat list
pub fn assert_room_seating_invariants(seats: &[Seat]) {
    let mut occupants = HashSet::new();
    let mut slots = HashSet::new();

    for seat in seats {
        assert_seat_invariants(seat);

        if let Some(occupant) = seat.occupant {
            debug_assert!(
                occupants.insert(occupant),
                "User {} holds more than one seat in room {}",
                occupant,
                seat.room_id
            );
        }

        debug_assert!(
            slots.insert((seat.row, seat.number)),
            "Duplicate seat slot ({}, {}) in room {}",
            seat.row,
            seat.number,
            seat.room_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_vacant_seat_valid() {
        let seat = Seat::new(Uuid::new_v4(), 1, 1);
        assert_seat_invariants(&seat);
    }

    #[test]
    fn test_occupied_seat_valid() {
        let mut seat = Seat::new(Uuid::new_v4(), 2, 3);
        seat.occupant = Some(Uuid::new_v4());
        seat.occupied_since = Some(Utc::now());
        assert_seat_invariants(&seat);
    }

    #[test]
    #[should_panic(expected = "occupied_since")]
    fn test_occupant_without_timestamp_panics() {
        let mut seat = Seat::new(Uuid::new_v4(), 1, 1);
        seat.occupant = Some(Uuid::new_v4());
        assert_seat_invariants(&seat);
    }

    #[test]
    #[should_panic(expected = "more than one seat")]
    fn test_double_occupancy_panics() {
        let room_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let mut a = Seat::new(room_id, 1, 1);
        let mut b = Seat::new(room_id, 1, 2);
        for seat in [&mut a, &mut b] {
            seat.occupant = Some(user_id);
            seat.occupied_since = Some(Utc::now());
        }
        assert_room_seating_invariants(&[a, b]);
    }
}
