//! Usher demo
//!
//! Runs a small in-memory venue end to end: provisions a two-row room,
//! races two clients for seats, joins them to voice presence with a silent
//! capture backend, prints the resulting seat board, and tears everything
//! down through the exit path.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usher_core::Room;
use usher_sync::{
    AudioBackend, CaptureDevice, ClaimOutcome, ExitBeacon, ExitListener, MicError,
    PresenceSynchronizer, RoomSeatView, SeatAllocator, SharedStore, SPECTRUM_BINS,
};
use uuid::Uuid;

/// Capture backend that always grants a silent device
struct SilentBackend;

struct SilentDevice;

impl CaptureDevice for SilentDevice {
    fn spectrum(&mut self, bins: &mut [f32; SPECTRUM_BINS]) {
        bins.fill(0.0);
    }

    fn close(&mut self) {}
}

impl AudioBackend for SilentBackend {
    fn request_device(&self) -> Result<Box<dyn CaptureDevice>, MicError> {
        Ok(Box::new(SilentDevice))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Usher demo");

    let store = Arc::new(SharedStore::open_in_memory()?);
    let room = Room::new("Grand Hall".to_string());
    store.create_room(&room)?;
    store.provision_seats(room.id, &[3, 3])?;

    let listener = ExitListener::start(Arc::clone(&store), "127.0.0.1:0".parse()?).await?;
    let exit_addr = listener.addr();

    let alice_id = Uuid::new_v4();
    let bob_id = Uuid::new_v4();

    // Alice watches the room; her board refreshes on every change
    let view = RoomSeatView::new(Arc::clone(&store), room.id, alice_id);
    let board_rx = view.enter()?;

    // Both clients race for seats concurrently
    let alice_alloc = SeatAllocator::new(Arc::clone(&store), room.id, alice_id);
    let bob_alloc = SeatAllocator::new(Arc::clone(&store), room.id, bob_id);
    let (alice_seat, bob_seat) = tokio::join!(
        tokio::task::spawn_blocking(move || alice_alloc.claim_any_seat()),
        tokio::task::spawn_blocking(move || bob_alloc.claim_any_seat()),
    );
    report_claim("alice", alice_seat??);
    report_claim("bob", bob_seat??);

    // Voice presence with a silent microphone
    let alice_voice = PresenceSynchronizer::new(
        Arc::clone(&store),
        room.id,
        alice_id,
        "alice".to_string(),
    );
    let bob_voice =
        PresenceSynchronizer::new(Arc::clone(&store), room.id, bob_id, "bob".to_string());
    alice_voice.connect(&SilentBackend)?;
    bob_voice.connect(&SilentBackend)?;

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    println!("Seat board for {}:", room.name);
    for info in &board_rx.borrow().seats {
        let who = match (&info.seat.occupant, info.is_mine) {
            (Some(_), true) => "me",
            (Some(_), false) => "taken",
            (None, _) => "vacant",
        };
        println!(
            "  row {} seat {} @ ({:.1}, {:.1}, {:.1}) [{}]",
            info.seat.row, info.seat.number, info.position.x, info.position.y, info.position.z, who
        );
    }
    println!(
        "Present: {} peer(s) visible to alice",
        alice_voice.peers().len()
    );

    // Bob's process "exits": one fire-and-forget datagram frees his seat
    ExitBeacon::send(exit_addr, room.id, bob_id);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    println!(
        "After bob's exit signal: {} seat(s) occupied",
        board_rx.borrow().occupied_count()
    );

    bob_voice.disconnect().await;
    alice_voice.disconnect().await;
    view.leave().await;
    listener.shutdown().await;

    tracing::info!("Demo complete");
    Ok(())
}

fn report_claim(name: &str, outcome: ClaimOutcome) {
    match outcome {
        ClaimOutcome::Seated { position, .. } => {
            println!("{name} seated at ({:.1}, {:.1}, {:.1})", position.x, position.y, position.z);
        }
        ClaimOutcome::RoomFull => println!("{name}: room full"),
        ClaimOutcome::Contended => println!("{name}: seat race lost, try again"),
    }
}
