//! Seat screen-position computation
//!
//! Pure projection from (row, number) indices to screen space. Rows are
//! centered around x = 0 individually, so rows narrower than the widest row
//! still sit centered. Deterministic for identical input in any order.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Seat;

/// Horizontal distance between adjacent seats in a row
pub const SEAT_SPACING: f32 = 1.6;

/// Depth distance between adjacent rows
pub const ROW_SPACING: f32 = 2.2;

/// Seat surface height
pub const SEAT_HEIGHT: f32 = 0.5;

/// Derived screen position of a seat; computed, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeatPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Compute positions for every seat in a room.
///
/// Groups seats by row, centers each row horizontally, and steps depth by
/// row index. Output is keyed by seat id and identical for identical input
/// regardless of input order.
pub fn compute_seat_positions(seats: &[Seat]) -> HashMap<Uuid, SeatPosition> {
    // BTreeMap keeps row iteration order stable independent of input order
    let mut rows: BTreeMap<u32, Vec<&Seat>> = BTreeMap::new();
    for seat in seats {
        rows.entry(seat.row).or_default().push(seat);
    }

    let mut positions = HashMap::with_capacity(seats.len());
    for (row, row_seats) in rows {
        let count = row_seats.len();
        // Center offset so the row straddles x = 0
        let half_width = (count.saturating_sub(1)) as f32 * SEAT_SPACING / 2.0;
        let z = (row.saturating_sub(1)) as f32 * ROW_SPACING;

        let mut ordered = row_seats;
        ordered.sort_by_key(|s| s.number);

        for seat in ordered {
            let x = (seat.number.saturating_sub(1)) as f32 * SEAT_SPACING - half_width;
            positions.insert(
                seat.id,
                SeatPosition {
                    x,
                    y: SEAT_HEIGHT,
                    z,
                },
            );
        }
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[u32]) -> Vec<Seat> {
        let room_id = Uuid::new_v4();
        let mut seats = Vec::new();
        for (i, &count) in rows.iter().enumerate() {
            for number in 1..=count {
                seats.push(Seat::new(room_id, i as u32 + 1, number));
            }
        }
        seats
    }

    #[test]
    fn test_single_seat_centered() {
        let seats = grid(&[1]);
        let positions = compute_seat_positions(&seats);
        let pos = positions[&seats[0].id];
        assert_eq!(pos.x, 0.0);
        assert_eq!(pos.z, 0.0);
    }

    #[test]
    fn test_row_is_centered() {
        let seats = grid(&[3]);
        let positions = compute_seat_positions(&seats);

        let xs: Vec<f32> = seats.iter().map(|s| positions[&s.id].x).collect();
        assert_eq!(xs, vec![-SEAT_SPACING, 0.0, SEAT_SPACING]);
    }

    #[test]
    fn test_narrow_row_centered_against_wide_row() {
        // Row 1 has 4 seats, row 2 has 2 - both straddle x = 0
        let seats = grid(&[4, 2]);
        let positions = compute_seat_positions(&seats);

        for row in [1u32, 2] {
            let sum: f32 = seats
                .iter()
                .filter(|s| s.row == row)
                .map(|s| positions[&s.id].x)
                .sum();
            assert!(sum.abs() < 1e-5, "row {} not centered: sum {}", row, sum);
        }
    }

    #[test]
    fn test_rows_step_in_depth() {
        let seats = grid(&[1, 1, 1]);
        let positions = compute_seat_positions(&seats);

        let zs: Vec<f32> = seats.iter().map(|s| positions[&s.id].z).collect();
        assert_eq!(zs, vec![0.0, ROW_SPACING, 2.0 * ROW_SPACING]);
    }

    #[test]
    fn test_deterministic_under_reordering() {
        let mut seats = grid(&[3, 5, 2]);
        let forward = compute_seat_positions(&seats);

        seats.reverse();
        let reversed = compute_seat_positions(&seats);

        assert_eq!(forward.len(), reversed.len());
        for (id, pos) in &forward {
            assert_eq!(reversed[id], *pos);
        }
    }
}
