//! Usher Core Library
//!
//! Domain models, seat layout math, configuration, and SQLite storage for
//! the Usher virtual-venue seating layer.

pub mod config;
pub mod error;
pub mod invariants;
pub mod layout;
pub mod models;
pub mod storage;

pub use config::VenueConfig;
pub use error::{Error, Result};
pub use layout::{compute_seat_positions, SeatPosition};
pub use models::*;
pub use storage::{Database, RoomRepository, RoomStore, SeatRepository, SeatStore, Storage};
