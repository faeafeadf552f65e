//! Abandonment sweeper
//!
//! Reclaims seats whose occupancy has aged past the configured threshold,
//! protecting against clients that crash, lose network, or close without
//! releasing. Runs once whenever a client enters a room rather than on a
//! global schedule: a coarse, time-based policy that needs no liveness
//! pings. A truly-gone user's seat can stay held for up to the threshold;
//! the exit beacon usually clears it much sooner.

use chrono::Utc;
use tracing::info;
use usher_core::VenueConfig;
use uuid::Uuid;

use crate::error::Result;
use crate::store::SharedStore;

/// Run one reclamation pass for a room.
///
/// A single conditional bulk update: every seat with `occupied_since` older
/// than the threshold is cleared, everything newer is untouched. Returns the
/// number of seats reclaimed.
pub fn sweep_on_entry(store: &SharedStore, room_id: Uuid, config: &VenueConfig) -> Result<u64> {
    let cutoff = Utc::now() - config.abandon_threshold();
    let reclaimed = store.reclaim_abandoned_seats(room_id, cutoff)?;
    if reclaimed > 0 {
        info!(room_id = %room_id, reclaimed, "Swept abandoned seats");
    }
    Ok(reclaimed)
}
