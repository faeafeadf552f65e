//! Room model - a bounded shared space containing seats

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who may enter a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum AccessLevel {
    #[default]
    Public = 0,
    Members = 1,
    Vip = 2,
}

/// A Room is a shared venue space with seats and a presence channel.
///
/// Rooms are created and edited by an operator; this core only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    /// Reference into the media catalog (opaque to this core)
    pub media_ref: Option<String>,
    pub is_open: bool,
    pub access_level: AccessLevel,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            media_ref: None,
            is_open: true,
            access_level: AccessLevel::Public,
            created_at: Utc::now(),
        }
    }

    pub fn with_media_ref(mut self, media_ref: String) -> Self {
        self.media_ref = Some(media_ref);
        self
    }

    pub fn with_access_level(mut self, level: AccessLevel) -> Self {
        self.access_level = level;
        self
    }
}
