//! In-process change-notification and presence channel hub
//!
//! Rendition of the shared store's two fan-out primitives: a row-change
//! notification stream per room (seats) and an ephemeral, membership-aware
//! presence channel per room. Both are tokio broadcast channels; seat
//! subscribers that lag simply catch up on the next notification because
//! consumers always re-read the full state rather than patching.
//!
//! Presence rosters are authoritative only through `PresenceEvent::Sync`:
//! every membership or metadata change re-broadcasts the complete roster,
//! and `Joined`/`Left` are informational. Consumers must rebuild their peer
//! list from `Sync`, never patch it from individual events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Broadcast buffer depth per room channel
const CHANNEL_CAPACITY: usize = 64;

/// What kind of seat mutation triggered a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Claimed,
    Released,
    Reclaimed,
}

/// A seat-table change notification scoped to one room
#[derive(Debug, Clone, Copy)]
pub struct SeatChange {
    pub room_id: Uuid,
    pub kind: ChangeKind,
}

/// Metadata a client broadcasts about itself on a presence channel.
///
/// Each client owns and broadcasts only its own entry; everything received
/// from the channel is a read-only mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerMeta {
    pub user_id: Uuid,
    pub display_name: String,
    pub muted: bool,
    pub speaking: bool,
    pub joined_at: DateTime<Utc>,
}

impl PeerMeta {
    pub fn new(user_id: Uuid, display_name: String) -> Self {
        Self {
            user_id,
            display_name,
            muted: false,
            speaking: false,
            joined_at: Utc::now(),
        }
    }
}

/// Events emitted by a room's presence channel
#[derive(Debug, Clone)]
pub enum PresenceEvent {
    /// Authoritative full roster; replaces any local peer list
    Sync(Vec<PeerMeta>),
    /// A member joined (informational)
    Joined(PeerMeta),
    /// A member left (informational)
    Left { user_id: Uuid },
}

struct RoomChannels {
    seats: broadcast::Sender<SeatChange>,
    presence: broadcast::Sender<PresenceEvent>,
    members: HashMap<Uuid, PeerMeta>,
}

impl RoomChannels {
    fn new() -> Self {
        let (seats, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (presence, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            seats,
            presence,
            members: HashMap::new(),
        }
    }

    /// Roster in a stable order (join time, then id as tiebreak)
    fn roster(&self) -> Vec<PeerMeta> {
        let mut members: Vec<PeerMeta> = self.members.values().cloned().collect();
        members.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        members
    }
}

/// Per-room notification and presence fan-out, shared by all clients.
#[derive(Clone, Default)]
pub struct ChangeHub {
    rooms: Arc<Mutex<HashMap<Uuid, RoomChannels>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to seat-change notifications for a room
    pub fn subscribe_seats(&self, room_id: Uuid) -> broadcast::Receiver<SeatChange> {
        let mut rooms = self.rooms.lock().unwrap();
        rooms
            .entry(room_id)
            .or_insert_with(RoomChannels::new)
            .seats
            .subscribe()
    }

    /// Notify all seat subscribers of a room that its seat table changed
    pub fn notify_seats(&self, room_id: Uuid, kind: ChangeKind) {
        let rooms = self.rooms.lock().unwrap();
        if let Some(channels) = rooms.get(&room_id) {
            // No receivers is fine; nobody is watching this room
            let _ = channels.seats.send(SeatChange { room_id, kind });
        }
    }

    /// Join a room's presence channel, broadcasting the initial metadata.
    ///
    /// Returns the membership handle and the event stream. The join itself
    /// produces a `Joined` event plus an authoritative `Sync`.
    pub fn join_presence(
        &self,
        room_id: Uuid,
        meta: PeerMeta,
    ) -> (PresenceHandle, broadcast::Receiver<PresenceEvent>) {
        let user_id = meta.user_id;
        let mut rooms = self.rooms.lock().unwrap();
        let channels = rooms.entry(room_id).or_insert_with(RoomChannels::new);

        let rx = channels.presence.subscribe();
        channels.members.insert(user_id, meta.clone());

        debug!(room_id = %room_id, user_id = %user_id, "Peer joined presence channel");
        let _ = channels.presence.send(PresenceEvent::Joined(meta));
        let _ = channels
            .presence
            .send(PresenceEvent::Sync(channels.roster()));

        (
            PresenceHandle {
                hub: self.clone(),
                room_id,
                user_id,
                left: false,
            },
            rx,
        )
    }

    /// Snapshot of a room's current presence roster
    pub fn roster(&self, room_id: Uuid) -> Vec<PeerMeta> {
        let rooms = self.rooms.lock().unwrap();
        rooms.get(&room_id).map(|c| c.roster()).unwrap_or_default()
    }

    fn track(&self, room_id: Uuid, meta: PeerMeta) {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(channels) = rooms.get_mut(&room_id) {
            channels.members.insert(meta.user_id, meta);
            let _ = channels
                .presence
                .send(PresenceEvent::Sync(channels.roster()));
        }
    }

    fn leave(&self, room_id: Uuid, user_id: Uuid) {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(channels) = rooms.get_mut(&room_id) {
            if channels.members.remove(&user_id).is_some() {
                debug!(room_id = %room_id, user_id = %user_id, "Peer left presence channel");
                let _ = channels.presence.send(PresenceEvent::Left { user_id });
                let _ = channels
                    .presence
                    .send(PresenceEvent::Sync(channels.roster()));
            }
        }
    }
}

/// Membership in a room's presence channel.
///
/// Leaving (explicitly or by drop) removes the member and re-syncs the
/// roster, so a dropped client never lingers as a stale member.
pub struct PresenceHandle {
    hub: ChangeHub,
    room_id: Uuid,
    user_id: Uuid,
    left: bool,
}

impl PresenceHandle {
    /// Re-broadcast this client's metadata (mute/speaking changes)
    pub fn track(&self, meta: PeerMeta) {
        self.hub.track(self.room_id, meta);
    }

    /// Leave the channel explicitly
    pub fn leave(mut self) {
        self.leave_inner();
    }

    fn leave_inner(&mut self) {
        if !self.left {
            self.left = true;
            self.hub.leave(self.room_id, self.user_id);
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

impl Drop for PresenceHandle {
    fn drop(&mut self) {
        self.leave_inner();
    }
}
