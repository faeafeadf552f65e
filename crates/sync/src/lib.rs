//! Usher Sync Library
//!
//! Client-side coordination layer for the Usher virtual venue: seat
//! allocation, seat-list synchronization, presence channels with voice
//! metadata, abandonment sweeping, and the best-effort exit beacon.
//!
//! Every client is an independent actor; the only mutual exclusion in the
//! system is the conditional seat update in the shared store. Everything
//! else is eventual consistency driven by change notifications and
//! full-roster presence syncs.

pub mod audio;
pub mod error;
pub mod exit;
pub mod hub;
pub mod presence;
pub mod seats;
pub mod store;
pub mod sweeper;
pub mod view;

pub use audio::{is_speaking, AudioBackend, CaptureDevice, MicError, SPECTRUM_BINS};
pub use error::{Error, Result};
pub use exit::{ExitBeacon, ExitListener, ExitSignal};
pub use hub::{ChangeHub, ChangeKind, PeerMeta, PresenceEvent, PresenceHandle, SeatChange};
pub use presence::{PresenceSynchronizer, RemotePeer, VoiceState};
pub use seats::{ClaimOutcome, SeatAllocator};
pub use store::SharedStore;
pub use view::{RoomSeatView, SeatBoard, SeatInfo, ViewState};
