//! Presence synchronizer
//!
//! Manages one client's ephemeral membership in a room's presence channel
//! and mirrors its microphone state to the other members. The peer roster is
//! never patched from individual join/leave events: every `Sync` replaces it
//! wholesale, which eliminates drift from missed events. Per-peer volume and
//! local mute are viewer-side playback overrides and are never broadcast.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use usher_core::VenueConfig;
use uuid::Uuid;

use crate::audio::{is_speaking, AudioBackend, CaptureDevice, SPECTRUM_BINS};
use crate::error::{Error, Result};
use crate::hub::{PeerMeta, PresenceEvent, PresenceHandle};
use crate::store::SharedStore;

/// Connection lifecycle for voice presence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Disconnected,
    RequestingDevice,
    Connected,
}

/// A remote member as this client sees it
#[derive(Debug, Clone)]
pub struct RemotePeer {
    pub meta: PeerMeta,
    /// Playback volume multiplier, viewer-local, never broadcast
    pub volume: f32,
    /// Viewer-local mute, never broadcast
    pub muted_locally: bool,
}

pub struct PresenceSynchronizer {
    store: Arc<SharedStore>,
    room_id: Uuid,
    config: VenueConfig,
    state: Mutex<VoiceState>,
    /// This client's own metadata; the only entry it ever broadcasts
    meta: Arc<Mutex<PeerMeta>>,
    /// Read-only mirrors of the other members, rebuilt on every Sync
    peers: Arc<Mutex<HashMap<Uuid, RemotePeer>>>,
    channel: Mutex<Option<Arc<PresenceHandle>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    event_shutdown: Mutex<Option<oneshot::Sender<()>>>,
    poll_shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl PresenceSynchronizer {
    pub fn new(
        store: Arc<SharedStore>,
        room_id: Uuid,
        user_id: Uuid,
        display_name: String,
    ) -> Self {
        Self::with_config(store, room_id, user_id, display_name, VenueConfig::default())
    }

    pub fn with_config(
        store: Arc<SharedStore>,
        room_id: Uuid,
        user_id: Uuid,
        display_name: String,
        config: VenueConfig,
    ) -> Self {
        Self {
            store,
            room_id,
            config,
            state: Mutex::new(VoiceState::Disconnected),
            meta: Arc::new(Mutex::new(PeerMeta::new(user_id, display_name))),
            peers: Arc::new(Mutex::new(HashMap::new())),
            channel: Mutex::new(None),
            event_task: Mutex::new(None),
            poll_task: Mutex::new(None),
            event_shutdown: Mutex::new(None),
            poll_shutdown: Mutex::new(None),
        }
    }

    pub fn state(&self) -> VoiceState {
        *self.state.lock().unwrap()
    }

    pub fn local_meta(&self) -> PeerMeta {
        self.meta.lock().unwrap().clone()
    }

    /// Remote members in stable (join time, id) order
    pub fn peers(&self) -> Vec<RemotePeer> {
        let peers = self.peers.lock().unwrap();
        let mut list: Vec<RemotePeer> = peers.values().cloned().collect();
        list.sort_by(|a, b| {
            a.meta
                .joined_at
                .cmp(&b.meta.joined_at)
                .then_with(|| a.meta.user_id.cmp(&b.meta.user_id))
        });
        list
    }

    /// Acquire the microphone and join the room's presence channel.
    ///
    /// Device acquisition failures surface as the specific `MicError` and
    /// leave the synchronizer fully disconnected; nothing half-joins.
    /// Connecting while already connected is rejected: a second join would
    /// orphan the running tasks, and the orphaned poll task's handle would
    /// later evict the fresh membership when it drops.
    pub fn connect(&self, backend: &dyn AudioBackend) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != VoiceState::Disconnected {
                return Err(Error::AlreadyConnected);
            }
            *state = VoiceState::RequestingDevice;
        }

        let device = match backend.request_device() {
            Ok(device) => device,
            Err(e) => {
                *self.state.lock().unwrap() = VoiceState::Disconnected;
                warn!(room_id = %self.room_id, error = %e, "Microphone unavailable");
                return Err(e.into());
            }
        };

        let initial = {
            let mut meta = self.meta.lock().unwrap();
            meta.joined_at = chrono::Utc::now();
            meta.speaking = false;
            meta.clone()
        };
        let user_id = initial.user_id;

        let (handle, events) = self.store.join_presence(self.room_id, initial);
        let handle = Arc::new(handle);

        let (event_shutdown_tx, event_shutdown_rx) = oneshot::channel();
        let event_handle = tokio::spawn(event_task(
            events,
            event_shutdown_rx,
            Arc::clone(&self.peers),
            user_id,
        ));

        let (poll_shutdown_tx, poll_shutdown_rx) = oneshot::channel();
        let poll_handle = tokio::spawn(poll_task(
            device,
            poll_shutdown_rx,
            Arc::clone(&self.meta),
            Arc::clone(&handle),
            self.config.speaking_threshold,
            self.config.spectrum_poll_ms,
        ));

        *self.channel.lock().unwrap() = Some(handle);
        *self.event_task.lock().unwrap() = Some(event_handle);
        *self.poll_task.lock().unwrap() = Some(poll_handle);
        *self.event_shutdown.lock().unwrap() = Some(event_shutdown_tx);
        *self.poll_shutdown.lock().unwrap() = Some(poll_shutdown_tx);

        *self.state.lock().unwrap() = VoiceState::Connected;
        info!(room_id = %self.room_id, user_id = %user_id, "Voice presence connected");
        Ok(())
    }

    /// Toggle the local mute flag and re-broadcast metadata. Returns the new
    /// muted state.
    pub fn toggle_mic(&self) -> bool {
        let meta = {
            let mut meta = self.meta.lock().unwrap();
            meta.muted = !meta.muted;
            meta.clone()
        };
        let muted = meta.muted;
        if let Some(handle) = self.channel.lock().unwrap().as_ref() {
            handle.track(meta);
        }
        muted
    }

    /// Set a peer's playback volume (clamped to 0..=1). Viewer-local only.
    pub fn set_peer_volume(&self, peer_id: Uuid, volume: f32) {
        let mut peers = self.peers.lock().unwrap();
        if let Some(peer) = peers.get_mut(&peer_id) {
            peer.volume = volume.clamp(0.0, 1.0);
        } else {
            debug!(peer_id = %peer_id, "Volume override for unknown peer ignored");
        }
    }

    /// Toggle a peer's local mute. Viewer-local only.
    pub fn toggle_peer_mute(&self, peer_id: Uuid) {
        let mut peers = self.peers.lock().unwrap();
        if let Some(peer) = peers.get_mut(&peer_id) {
            peer.muted_locally = !peer.muted_locally;
        } else {
            debug!(peer_id = %peer_id, "Mute override for unknown peer ignored");
        }
    }

    /// Leave voice presence, tearing everything down together.
    ///
    /// The capture device is closed, the spectrum poll stops, the event loop
    /// stops, and the channel membership is removed. All four go together; a
    /// partial teardown would leak a device handle or leave a stale member
    /// visible to peers.
    pub async fn disconnect(&self) {
        if let Some(tx) = self.poll_shutdown.lock().unwrap().take() {
            let _ = tx.send(());
        }
        if let Some(tx) = self.event_shutdown.lock().unwrap().take() {
            let _ = tx.send(());
        }

        // Await the tasks so the device close has actually run and the
        // tasks' channel handle clones are gone
        let poll = self.poll_task.lock().unwrap().take();
        if let Some(handle) = poll {
            let _ = handle.await;
        }
        let event = self.event_task.lock().unwrap().take();
        if let Some(handle) = event {
            let _ = handle.await;
        }

        // Last handle reference drops here; the channel sees us leave
        *self.channel.lock().unwrap() = None;

        self.peers.lock().unwrap().clear();
        *self.state.lock().unwrap() = VoiceState::Disconnected;
        info!(room_id = %self.room_id, "Voice presence disconnected");
    }
}

/// Rebuild the peer map from an authoritative roster, excluding self and
/// carrying over viewer-local overrides by user id.
fn rebuild_peers(
    peers: &Mutex<HashMap<Uuid, RemotePeer>>,
    roster: Vec<PeerMeta>,
    local_user: Uuid,
) {
    let mut peers = peers.lock().unwrap();
    let previous = std::mem::take(&mut *peers);

    for meta in roster {
        if meta.user_id == local_user {
            continue;
        }
        let (volume, muted_locally) = previous
            .get(&meta.user_id)
            .map(|p| (p.volume, p.muted_locally))
            .unwrap_or((1.0, false));
        peers.insert(
            meta.user_id,
            RemotePeer {
                meta,
                volume,
                muted_locally,
            },
        );
    }
}

/// Applies presence channel events to the peer roster
async fn event_task(
    mut events: broadcast::Receiver<PresenceEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
    peers: Arc<Mutex<HashMap<Uuid, RemotePeer>>>,
    local_user: Uuid,
) {
    loop {
        tokio::select! {
            result = events.recv() => {
                match result {
                    Ok(PresenceEvent::Sync(roster)) => {
                        rebuild_peers(&peers, roster, local_user);
                    }
                    Ok(PresenceEvent::Joined(meta)) => {
                        // Informational; the roster change arrives via Sync
                        debug!(user_id = %meta.user_id, "Peer joined");
                    }
                    Ok(PresenceEvent::Left { user_id }) => {
                        debug!(user_id = %user_id, "Peer left");
                    }
                    // A missed event is recovered by the next full Sync
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Presence events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = &mut shutdown_rx => break,
        }
    }
}

/// Polls the microphone spectrum at frame cadence and re-broadcasts
/// metadata whenever the speaking flag flips. Owns the capture device and
/// closes it on the way out.
async fn poll_task(
    mut device: Box<dyn CaptureDevice>,
    mut shutdown_rx: oneshot::Receiver<()>,
    meta: Arc<Mutex<PeerMeta>>,
    channel: Arc<PresenceHandle>,
    threshold: f32,
    poll_ms: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(poll_ms.max(1)));
    let mut bins = [0f32; SPECTRUM_BINS];

    loop {
        tokio::select! {
            _ = interval.tick() => {
                device.spectrum(&mut bins);
                let speaking = is_speaking(&bins, threshold);

                let changed = {
                    let mut meta = meta.lock().unwrap();
                    if meta.speaking != speaking {
                        meta.speaking = speaking;
                        Some(meta.clone())
                    } else {
                        None
                    }
                };
                if let Some(updated) = changed {
                    channel.track(updated);
                }
            }
            _ = &mut shutdown_rx => break,
        }
    }

    device.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MicError;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockDevice {
        level: Arc<Mutex<f32>>,
        closed: Arc<AtomicBool>,
    }

    impl CaptureDevice for MockDevice {
        fn spectrum(&mut self, bins: &mut [f32; SPECTRUM_BINS]) {
            bins.fill(*self.level.lock().unwrap());
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct MockBackend {
        level: Arc<Mutex<f32>>,
        closed: Arc<AtomicBool>,
        fail_with: Option<MicError>,
    }

    impl MockBackend {
        fn working() -> Self {
            Self {
                level: Arc::new(Mutex::new(0.0)),
                closed: Arc::new(AtomicBool::new(false)),
                fail_with: None,
            }
        }

        fn failing(error: MicError) -> Self {
            Self {
                fail_with: Some(error),
                ..Self::working()
            }
        }
    }

    impl AudioBackend for MockBackend {
        fn request_device(&self) -> std::result::Result<Box<dyn CaptureDevice>, MicError> {
            if let Some(e) = self.fail_with {
                return Err(e);
            }
            Ok(Box::new(MockDevice {
                level: Arc::clone(&self.level),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn venue() -> (Arc<SharedStore>, Uuid) {
        let store = Arc::new(SharedStore::open_in_memory().unwrap());
        (store, Uuid::new_v4())
    }

    async fn wait_until<F: Fn() -> bool>(what: &str, check: F) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timed out waiting for {}", what);
    }

    #[tokio::test]
    async fn test_connect_joins_channel() {
        let (store, room_id) = venue();
        let sync = PresenceSynchronizer::new(
            store.clone(),
            room_id,
            Uuid::new_v4(),
            "alice".to_string(),
        );

        sync.connect(&MockBackend::working()).unwrap();
        assert_eq!(sync.state(), VoiceState::Connected);
        assert_eq!(store.hub().roster(room_id).len(), 1);

        sync.disconnect().await;
    }

    #[tokio::test]
    async fn test_device_failure_leaves_disconnected() {
        let (store, room_id) = venue();

        for error in [
            MicError::Denied,
            MicError::NotFound,
            MicError::Busy,
            MicError::Unsupported,
        ] {
            let sync = PresenceSynchronizer::new(
                store.clone(),
                room_id,
                Uuid::new_v4(),
                "bob".to_string(),
            );
            let result = sync.connect(&MockBackend::failing(error));

            match result {
                Err(crate::Error::Mic(e)) => assert_eq!(e, error),
                other => panic!("Expected mic error, got {:?}", other.map(|_| ())),
            }
            assert_eq!(sync.state(), VoiceState::Disconnected);
            // Never half-joined: no stale membership visible to peers
            assert!(store.hub().roster(room_id).is_empty());
        }
    }

    #[tokio::test]
    async fn test_roster_converges_without_self() {
        let (store, room_id) = venue();
        let alice_id = Uuid::new_v4();
        let bob_id = Uuid::new_v4();

        let alice =
            PresenceSynchronizer::new(store.clone(), room_id, alice_id, "alice".to_string());
        let bob = PresenceSynchronizer::new(store.clone(), room_id, bob_id, "bob".to_string());

        alice.connect(&MockBackend::working()).unwrap();
        bob.connect(&MockBackend::working()).unwrap();

        wait_until("alice to see bob", || {
            alice.peers().iter().any(|p| p.meta.user_id == bob_id)
        })
        .await;

        let peers = alice.peers();
        assert_eq!(peers.len(), 1);
        assert!(peers.iter().all(|p| p.meta.user_id != alice_id));

        alice.disconnect().await;
        bob.disconnect().await;
    }

    #[tokio::test]
    async fn test_overrides_survive_resync() {
        let (store, room_id) = venue();
        let bob_id = Uuid::new_v4();

        let alice = PresenceSynchronizer::new(
            store.clone(),
            room_id,
            Uuid::new_v4(),
            "alice".to_string(),
        );
        let bob = PresenceSynchronizer::new(store.clone(), room_id, bob_id, "bob".to_string());

        alice.connect(&MockBackend::working()).unwrap();
        bob.connect(&MockBackend::working()).unwrap();

        wait_until("alice to see bob", || !alice.peers().is_empty()).await;
        alice.set_peer_volume(bob_id, 0.25);
        alice.toggle_peer_mute(bob_id);

        // A third member joining forces a full roster rebuild
        let carol = PresenceSynchronizer::new(
            store.clone(),
            room_id,
            Uuid::new_v4(),
            "carol".to_string(),
        );
        carol.connect(&MockBackend::working()).unwrap();

        wait_until("alice to see carol", || alice.peers().len() == 2).await;
        let bob_peer = alice
            .peers()
            .into_iter()
            .find(|p| p.meta.user_id == bob_id)
            .unwrap();
        assert_eq!(bob_peer.volume, 0.25);
        assert!(bob_peer.muted_locally);

        alice.disconnect().await;
        bob.disconnect().await;
        carol.disconnect().await;
    }

    #[tokio::test]
    async fn test_second_connect_rejected_membership_intact() {
        let (store, room_id) = venue();
        let sync = PresenceSynchronizer::new(
            store.clone(),
            room_id,
            Uuid::new_v4(),
            "alice".to_string(),
        );

        sync.connect(&MockBackend::working()).unwrap();
        match sync.connect(&MockBackend::working()) {
            Err(Error::AlreadyConnected) => {}
            other => panic!("Expected AlreadyConnected, got {:?}", other.map(|_| ())),
        }

        // The original session keeps running: still connected, and the
        // roster entry never disappears out from under the peers
        assert_eq!(sync.state(), VoiceState::Connected);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.hub().roster(room_id).len(), 1);

        sync.disconnect().await;
        assert!(store.hub().roster(room_id).is_empty());
    }

    #[tokio::test]
    async fn test_toggle_mic_rebroadcasts() {
        let (store, room_id) = venue();
        let user_id = Uuid::new_v4();
        let sync =
            PresenceSynchronizer::new(store.clone(), room_id, user_id, "alice".to_string());

        sync.connect(&MockBackend::working()).unwrap();
        assert!(sync.toggle_mic());

        let roster = store.hub().roster(room_id);
        assert!(roster[0].muted);

        assert!(!sync.toggle_mic());
        let roster = store.hub().roster(room_id);
        assert!(!roster[0].muted);

        sync.disconnect().await;
    }

    #[tokio::test]
    async fn test_speaking_detection_tracks_level() {
        let (store, room_id) = venue();
        let user_id = Uuid::new_v4();
        let backend = MockBackend::working();
        let level = Arc::clone(&backend.level);

        let config = VenueConfig {
            spectrum_poll_ms: 5,
            ..VenueConfig::default()
        };
        let sync = PresenceSynchronizer::with_config(
            store.clone(),
            room_id,
            user_id,
            "alice".to_string(),
            config,
        );
        sync.connect(&backend).unwrap();

        *level.lock().unwrap() = 80.0;
        wait_until("speaking flag to rise", || {
            store.hub().roster(room_id)[0].speaking
        })
        .await;

        *level.lock().unwrap() = 0.0;
        wait_until("speaking flag to fall", || {
            !store.hub().roster(room_id)[0].speaking
        })
        .await;

        sync.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_tears_everything_down() {
        let (store, room_id) = venue();
        let backend = MockBackend::working();
        let closed = Arc::clone(&backend.closed);

        let sync = PresenceSynchronizer::new(
            store.clone(),
            room_id,
            Uuid::new_v4(),
            "alice".to_string(),
        );
        sync.connect(&backend).unwrap();
        sync.disconnect().await;

        assert_eq!(sync.state(), VoiceState::Disconnected);
        assert!(closed.load(Ordering::SeqCst), "Device handle leaked");
        assert!(sync.peers().is_empty());
        // No stale channel membership visible to peers
        assert!(store.hub().roster(room_id).is_empty());
    }

    #[tokio::test]
    async fn test_volume_clamped() {
        let (store, room_id) = venue();
        let bob_id = Uuid::new_v4();

        let alice = PresenceSynchronizer::new(
            store.clone(),
            room_id,
            Uuid::new_v4(),
            "alice".to_string(),
        );
        let bob = PresenceSynchronizer::new(store.clone(), room_id, bob_id, "bob".to_string());

        alice.connect(&MockBackend::working()).unwrap();
        bob.connect(&MockBackend::working()).unwrap();
        wait_until("alice to see bob", || !alice.peers().is_empty()).await;

        alice.set_peer_volume(bob_id, 7.5);
        assert_eq!(alice.peers()[0].volume, 1.0);

        alice.set_peer_volume(bob_id, -1.0);
        assert_eq!(alice.peers()[0].volume, 0.0);

        alice.disconnect().await;
        bob.disconnect().await;
    }
}
