//! Media engine interface consumed by the coordination layer
//!
//! The actual audio/video capture, encoding and transport live in an
//! external media-session library. This module defines the narrow surface
//! the hand-off logic needs from it: connect to a room with preferred
//! devices, enumerate/publish/unpublish local tracks, disconnect, and read
//! back which devices are currently capturing.
//!
//! It also defines [`CallFlagStore`], the seam for the small piece of
//! persisted state the client keeps ("currently in a call" + last room),
//! written on join and cleared on teardown. The flags are used only to
//! detect a stale session on restart; they are never authoritative.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::call::RoomId;
use crate::error::ClientResult;

/// Kind of a locally published media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    /// Camera video track
    Camera,
    /// Microphone audio track
    Microphone,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Camera => write!(f, "camera"),
            TrackKind::Microphone => write!(f, "microphone"),
        }
    }
}

/// The user's preferred capture devices
///
/// Process-wide: set by the host's device picker, read (and back-filled
/// from the live session) by the media hand-off, and carried across call
/// switches even though the underlying media session is destroyed and
/// recreated.
///
/// ```rust
/// use livecall_client_core::media::DeviceSelection;
///
/// let mut devices = DeviceSelection::default();
/// assert!(devices.is_empty());
/// devices.camera_id = Some("cam-front".to_string());
/// assert!(!devices.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSelection {
    /// Preferred camera device id, if the user picked one
    pub camera_id: Option<String>,
    /// Preferred microphone device id, if the user picked one
    pub microphone_id: Option<String>,
}

impl DeviceSelection {
    /// True when neither device has been selected
    pub fn is_empty(&self) -> bool {
        self.camera_id.is_none() && self.microphone_id.is_none()
    }

    /// Fill unset fields from `other`, keeping existing choices
    pub fn fill_missing_from(&mut self, other: &DeviceSelection) {
        if self.camera_id.is_none() {
            self.camera_id = other.camera_id.clone();
        }
        if self.microphone_id.is_none() {
            self.microphone_id = other.microphone_id.clone();
        }
    }
}

/// A live connection to a media room
///
/// Returned by [`MediaEngine::connect`]; owned exclusively by the media
/// hand-off, which is the only component allowed to create or destroy it.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// The room this session is connected to
    fn room(&self) -> &RoomId;

    /// Kinds of tracks currently published by the local participant
    fn published_tracks(&self) -> Vec<TrackKind>;

    /// Publish a local track, optionally from a specific device
    async fn publish_track(&self, kind: TrackKind, device_id: Option<&str>) -> ClientResult<()>;

    /// Stop and unpublish a local track
    async fn unpublish_track(&self, kind: TrackKind) -> ClientResult<()>;

    /// Disconnect from the room; must be idempotent
    async fn disconnect(&self);

    /// Device ids the local participant is currently capturing from
    fn current_devices(&self) -> DeviceSelection;

    /// Number of remote participants currently in the room
    ///
    /// Advisory only: call teardown is driven by explicit signaling, never
    /// by this count (see DESIGN.md, open question 1).
    fn remote_participant_count(&self) -> usize;
}

/// Factory for media sessions
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Connect to `room`, capturing from the preferred `devices`
    ///
    /// Implementations publish the initial camera/microphone tracks as part
    /// of connecting when the devices are available; the hand-off verifies
    /// and completes publication afterwards.
    async fn connect(
        &self,
        room: &RoomId,
        devices: &DeviceSelection,
    ) -> ClientResult<Box<dyn MediaSession>>;
}

/// Persisted "currently in a call" flags
///
/// Written when a media session is joined and cleared during teardown.
#[async_trait]
pub trait CallFlagStore: Send + Sync {
    /// Record that the client is in a call in `room`
    async fn set_in_call(&self, room: &RoomId) -> anyhow::Result<()>;

    /// Clear the in-call flags
    async fn clear(&self) -> anyhow::Result<()>;

    /// Last recorded room, if the flags are set
    async fn in_call_room(&self) -> anyhow::Result<Option<RoomId>>;
}

/// In-memory [`CallFlagStore`], the default when the host persists nothing
#[derive(Debug, Default)]
pub struct InMemoryCallFlagStore {
    room: std::sync::Mutex<Option<RoomId>>,
}

impl InMemoryCallFlagStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallFlagStore for InMemoryCallFlagStore {
    async fn set_in_call(&self, room: &RoomId) -> anyhow::Result<()> {
        *self.room.lock().unwrap() = Some(room.clone());
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        *self.room.lock().unwrap() = None;
        Ok(())
    }

    async fn in_call_room(&self) -> anyhow::Result<Option<RoomId>> {
        Ok(self.room.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_selection_backfill_keeps_existing() {
        let mut chosen = DeviceSelection {
            camera_id: Some("cam-1".into()),
            microphone_id: None,
        };
        let live = DeviceSelection {
            camera_id: Some("cam-2".into()),
            microphone_id: Some("mic-2".into()),
        };
        chosen.fill_missing_from(&live);
        assert_eq!(chosen.camera_id.as_deref(), Some("cam-1"));
        assert_eq!(chosen.microphone_id.as_deref(), Some("mic-2"));
    }

    #[tokio::test]
    async fn in_memory_flags_round_trip() {
        let store = InMemoryCallFlagStore::new();
        assert!(store.in_call_room().await.unwrap().is_none());

        store.set_in_call(&RoomId::from("room-7")).await.unwrap();
        assert_eq!(
            store.in_call_room().await.unwrap().map(|r| r.0),
            Some("room-7".to_string())
        );

        store.clear().await.unwrap();
        assert!(store.in_call_room().await.unwrap().is_none());
    }
}
