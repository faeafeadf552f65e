//! Room seat view
//!
//! Read-only projection that keeps a client's local seat list in sync with
//! the store. Every change notification triggers a full re-read and
//! re-projection rather than incremental patching; that trades efficiency
//! for a view that converges even when individual notifications are dropped
//! or reordered. The `is_mine` flag is derived by occupant comparison and is
//! advisory only; movement logic trusts the allocator's claim results.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use usher_core::{compute_seat_positions, Seat, SeatPosition, VenueConfig};
use uuid::Uuid;

use crate::error::Result;
use crate::hub::SeatChange;
use crate::store::SharedStore;
use crate::sweeper;

/// Subscription lifecycle for one room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Unsubscribed,
    Subscribing,
    Synced,
}

/// One seat as the UI sees it
#[derive(Debug, Clone)]
pub struct SeatInfo {
    pub seat: Seat,
    pub position: SeatPosition,
    /// Occupant matches the local user. Advisory until the allocator confirms.
    pub is_mine: bool,
}

/// Full projected seat list for a room
#[derive(Debug, Clone, Default)]
pub struct SeatBoard {
    pub seats: Vec<SeatInfo>,
}

impl SeatBoard {
    pub fn occupied_count(&self) -> usize {
        self.seats.iter().filter(|s| !s.seat.is_vacant()).count()
    }
}

pub struct RoomSeatView {
    store: Arc<SharedStore>,
    room_id: Uuid,
    user_id: Uuid,
    config: VenueConfig,
    state: Mutex<ViewState>,
    board_tx: watch::Sender<SeatBoard>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RoomSeatView {
    pub fn new(store: Arc<SharedStore>, room_id: Uuid, user_id: Uuid) -> Self {
        Self::with_config(store, room_id, user_id, VenueConfig::default())
    }

    pub fn with_config(
        store: Arc<SharedStore>,
        room_id: Uuid,
        user_id: Uuid,
        config: VenueConfig,
    ) -> Self {
        let (board_tx, _) = watch::channel(SeatBoard::default());
        Self {
            store,
            room_id,
            user_id,
            config,
            state: Mutex::new(ViewState::Unsubscribed),
            board_tx,
            shutdown_tx: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ViewState {
        *self.state.lock().unwrap()
    }

    /// Current board snapshot receiver; updates as notifications arrive
    pub fn board(&self) -> watch::Receiver<SeatBoard> {
        self.board_tx.subscribe()
    }

    /// Enter the room: sweep abandoned seats, take the initial full read,
    /// and open the change subscription.
    pub fn enter(&self) -> Result<watch::Receiver<SeatBoard>> {
        *self.state.lock().unwrap() = ViewState::Subscribing;

        sweeper::sweep_on_entry(&self.store, self.room_id, &self.config)?;

        let seats = self.store.list_seats(self.room_id)?;
        let _ = self.board_tx.send(project(seats, self.user_id));

        let change_rx = self.store.subscribe_seats(self.room_id);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.shutdown_tx.lock().unwrap() = Some(shutdown_tx);

        let handle = tokio::spawn(sync_task(
            Arc::clone(&self.store),
            self.room_id,
            self.user_id,
            change_rx,
            shutdown_rx,
            self.board_tx.clone(),
        ));
        *self.task.lock().unwrap() = Some(handle);

        *self.state.lock().unwrap() = ViewState::Synced;
        info!(room_id = %self.room_id, "Seat view synced");

        Ok(self.board_tx.subscribe())
    }

    /// Leave the room and tear down the subscription.
    ///
    /// The sync task is signaled and awaited, so notifications arriving
    /// after departure are never applied to the board.
    pub async fn leave(&self) {
        if let Some(tx) = self.shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }

        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        *self.state.lock().unwrap() = ViewState::Unsubscribed;
        debug!(room_id = %self.room_id, "Seat view unsubscribed");
    }
}

/// Project a raw seat list through the layout and the is-mine derivation
fn project(seats: Vec<Seat>, user_id: Uuid) -> SeatBoard {
    let positions = compute_seat_positions(&seats);
    let seats = seats
        .into_iter()
        .filter_map(|seat| {
            let position = positions.get(&seat.id).copied()?;
            let is_mine = seat.is_held_by(user_id);
            Some(SeatInfo {
                seat,
                position,
                is_mine,
            })
        })
        .collect();
    SeatBoard { seats }
}

/// Re-reads the full seat list on every change notification
async fn sync_task(
    store: Arc<SharedStore>,
    room_id: Uuid,
    user_id: Uuid,
    mut change_rx: broadcast::Receiver<SeatChange>,
    mut shutdown_rx: oneshot::Receiver<()>,
    board_tx: watch::Sender<SeatBoard>,
) {
    loop {
        tokio::select! {
            result = change_rx.recv() => {
                match result {
                    // A lagged receiver still converges: the re-read below
                    // reflects every missed notification's final state
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        match store.list_seats(room_id) {
                            Ok(seats) => {
                                let _ = board_tx.send(project(seats, user_id));
                            }
                            Err(e) => {
                                warn!(room_id = %room_id, error = %e, "Seat re-read failed");
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(room_id = %room_id, "Seat change stream closed");
                        break;
                    }
                }
            }
            _ = &mut shutdown_rx => {
                debug!(room_id = %room_id, "Seat view shutting down");
                break;
            }
        }
    }
}
