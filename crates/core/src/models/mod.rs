//! Domain models

mod room;
mod seat;

pub use room::{AccessLevel, Room};
pub use seat::{Seat, SeatClaim};
