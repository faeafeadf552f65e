//! Coordination layer error types

use crate::audio::MicError;

/// Coordination result type
pub type Result<T> = std::result::Result<T, Error>;

/// Coordination errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] usher_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Mic(#[from] MicError),

    #[error("Voice presence is already connected")]
    AlreadyConnected,
}
