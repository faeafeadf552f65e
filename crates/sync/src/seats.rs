//! Seat allocation manager
//!
//! Owns the claim/release protocol for one user in one room. Claiming walks
//! the deterministic seat order (lowest row, then lowest number) and relies
//! on the store's conditional update as the only mutual exclusion: two
//! clients may pick the same candidate, but only one conditional write
//! succeeds. A lost race is a silent, expected outcome that is retried
//! against a fresh read; it is never surfaced as an error.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use usher_core::{compute_seat_positions, layout::SEAT_HEIGHT, SeatClaim, SeatPosition, VenueConfig};
use uuid::Uuid;

use crate::error::Result;
use crate::store::SharedStore;

/// Result of a claim-any-seat attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClaimOutcome {
    /// A seat was claimed and is now held by this user
    Seated {
        seat_id: Uuid,
        position: SeatPosition,
    },
    /// No vacant seat exists in the room
    RoomFull,
    /// Every attempt lost its race; the caller may re-invoke
    Contended,
}

pub struct SeatAllocator {
    store: Arc<SharedStore>,
    room_id: Uuid,
    user_id: Uuid,
    /// Fresh-read retries before giving up as contended
    attempts: u32,
    /// The seat this client believes it holds (client-local, optimistic)
    claim: Mutex<Option<SeatClaim>>,
}

impl SeatAllocator {
    pub fn new(store: Arc<SharedStore>, room_id: Uuid, user_id: Uuid) -> Self {
        Self::with_config(store, room_id, user_id, &VenueConfig::default())
    }

    pub fn with_config(
        store: Arc<SharedStore>,
        room_id: Uuid,
        user_id: Uuid,
        config: &VenueConfig,
    ) -> Self {
        Self {
            store,
            room_id,
            user_id,
            attempts: config.claim_attempts.max(1),
            claim: Mutex::new(None),
        }
    }

    /// The seat this client currently believes it holds
    pub fn current_claim(&self) -> Option<SeatClaim> {
        *self.claim.lock().unwrap()
    }

    /// Claim the first vacant seat in the room.
    ///
    /// Releases this user's previous seat in the room first, keeping the
    /// at-most-one-seat-per-user invariant. The local claim is only advanced
    /// once the conditional write is known to have succeeded; a store error
    /// leaves local state untouched.
    pub fn claim_any_seat(&self) -> Result<ClaimOutcome> {
        for attempt in 1..=self.attempts {
            let seats = self.store.list_seats(self.room_id)?;
            let Some(candidate) = seats.iter().find(|s| s.is_vacant()) else {
                debug!(room_id = %self.room_id, "No vacant seat");
                return Ok(ClaimOutcome::RoomFull);
            };
            let (seat_id, row, number) = (candidate.id, candidate.row, candidate.number);

            // Vacate any previously held seat before taking a new one. The
            // local claim is cleared the moment the release lands: from here
            // until a claim succeeds this user holds nothing, and
            // current_claim() must say so even if every attempt loses.
            self.store
                .release_seats_for_user(self.room_id, self.user_id)?;
            *self.claim.lock().unwrap() = None;

            if self
                .store
                .claim_seat_if_vacant(self.room_id, seat_id, self.user_id)?
            {
                let positions = compute_seat_positions(&seats);
                // The candidate came from this seat list, so its position is
                // always present; the fallback just keeps this total.
                let position = positions.get(&seat_id).copied().unwrap_or(SeatPosition {
                    x: 0.0,
                    y: SEAT_HEIGHT,
                    z: 0.0,
                });

                *self.claim.lock().unwrap() = Some(SeatClaim { seat_id, position });
                info!(
                    room_id = %self.room_id,
                    user_id = %self.user_id,
                    row,
                    number,
                    "Seat claimed"
                );
                return Ok(ClaimOutcome::Seated { seat_id, position });
            }

            debug!(attempt, seat_id = %seat_id, "Lost seat race, retrying with fresh list");
        }

        Ok(ClaimOutcome::Contended)
    }

    /// Release this user's seat and wait for the write. Idempotent.
    pub fn release_seat(&self) -> Result<()> {
        self.store
            .release_seats_for_user(self.room_id, self.user_id)?;
        *self.claim.lock().unwrap() = None;
        Ok(())
    }

    /// Stand up immediately and optimistically.
    ///
    /// Local state transitions right away; the authoritative release runs in
    /// a detached task and is reconciled by the next change notification.
    /// If the write fails the abandonment sweeper is the backstop.
    pub fn stand_up(&self) {
        *self.claim.lock().unwrap() = None;

        let store = Arc::clone(&self.store);
        let (room_id, user_id) = (self.room_id, self.user_id);
        tokio::spawn(async move {
            if let Err(e) = store.release_seats_for_user(room_id, user_id) {
                warn!(
                    room_id = %room_id,
                    user_id = %user_id,
                    error = %e,
                    "Deferred seat release failed; sweeper will reclaim"
                );
            }
        });
    }
}
