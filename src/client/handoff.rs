//! Media session hand-off: teardown-then-join without leaks
//!
//! This module owns the single live media session handle. Switching rooms
//! is one atomic operation under one lock: the old session is fully torn
//! down (tracks unpublished, disconnected, handle cleared, backend
//! notified, persisted flags wiped) strictly before the new join begins, so
//! the client can never publish into two rooms at once.
//!
//! Teardown is best-effort on the network side (peer/backend notification
//! is fire-and-forget) and mandatory on the local-resource side (tracks and
//! the handle are always released). Device preferences survive the swap:
//! when the user never picked devices explicitly, the ids the old session
//! was capturing from are captured before teardown and reused for the next
//! join.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::call::RoomId;
use crate::error::{ClientError, ClientResult};
use crate::media::{CallFlagStore, DeviceSelection, MediaEngine, MediaSession, TrackKind};
use crate::signaling::SignalingClient;

use super::recovery::{retry_with_backoff, RetryConfig};

/// Owner of the live media session and executor of the hand-off protocol
pub struct MediaSessionHandoff {
    engine: Arc<dyn MediaEngine>,
    flags: Arc<dyn CallFlagStore>,
    signaling: Arc<SignalingClient>,
    devices: Arc<RwLock<DeviceSelection>>,
    /// The only handle to the live session. Held across the whole
    /// teardown+join pair so swaps cannot interleave.
    session: Mutex<Option<Box<dyn MediaSession>>>,
    occupied: AtomicBool,
}

impl MediaSessionHandoff {
    /// Create a hand-off over the host's engine, flag store and devices
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        flags: Arc<dyn CallFlagStore>,
        signaling: Arc<SignalingClient>,
        devices: Arc<RwLock<DeviceSelection>>,
    ) -> Self {
        Self {
            engine,
            flags,
            signaling,
            devices,
            session: Mutex::new(None),
            occupied: AtomicBool::new(false),
        }
    }

    /// Whether a media session is currently live
    ///
    /// Read by poll eligibility; flips only inside the session lock.
    pub fn is_in_session(&self) -> bool {
        self.occupied.load(Ordering::SeqCst)
    }

    /// Remote participants in the live session, if any
    ///
    /// Advisory only: never used to drive teardown (DESIGN.md, open
    /// question 1).
    pub async fn remote_participants(&self) -> Option<usize> {
        let guard = self.session.lock().await;
        guard.as_ref().map(|s| s.remote_participant_count())
    }

    /// Tear down any live session, then join `room`
    ///
    /// `ended_call` is the backend id of the call whose session is being
    /// replaced, used for the fire-and-forget backend notification.
    /// The join never begins before the old session's disconnect completed.
    pub async fn swap_to(&self, room: &RoomId, ended_call: Option<u64>) -> ClientResult<()> {
        let mut guard = self.session.lock().await;

        if let Some(old) = guard.take() {
            self.occupied.store(false, Ordering::SeqCst);
            self.teardown_locked(old, ended_call).await;
        }

        let devices = self.devices.read().await.clone();
        info!(room = %room, camera = ?devices.camera_id, microphone = ?devices.microphone_id,
              "joining media session");

        let session = self.engine.connect(room, &devices).await.map_err(|e| {
            ClientError::MediaSessionFailed { reason: format!("connect to {room} failed: {e}") }
        })?;

        // Complete publication for anything the engine did not publish while
        // connecting. One retry each; a missing track downgrades the call
        // rather than dropping it.
        for kind in [TrackKind::Camera, TrackKind::Microphone] {
            if session.published_tracks().contains(&kind) {
                continue;
            }
            let device_id = match kind {
                TrackKind::Camera => devices.camera_id.as_deref(),
                TrackKind::Microphone => devices.microphone_id.as_deref(),
            };
            let session_ref = &session;
            let publish = retry_with_backoff("publish_track", RetryConfig::single(), || async move {
                session_ref.publish_track(kind, device_id).await
            })
            .await;
            if let Err(e) = publish {
                warn!(track = %kind, error = %e, "failed to publish track after join");
            }
        }

        if let Err(e) = self.flags.set_in_call(room).await {
            warn!(room = %room, error = %e, "failed to persist in-call flag");
        }

        *guard = Some(session);
        self.occupied.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Tear down the live session, if any
    pub async fn teardown(&self, ended_call: Option<u64>) {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.take() {
            self.occupied.store(false, Ordering::SeqCst);
            self.teardown_locked(session, ended_call).await;
        }
    }

    /// The five-step teardown. Callers must hold the session lock and have
    /// already taken the handle out of it.
    async fn teardown_locked(&self, session: Box<dyn MediaSession>, ended_call: Option<u64>) {
        let room = session.room().clone();
        info!(room = %room, "tearing down media session");

        // Capture device continuity before anything stops: if the user never
        // picked devices, the ids the session is capturing from become the
        // preference for the next join.
        {
            let mut devices = self.devices.write().await;
            if devices.is_empty() {
                devices.fill_missing_from(&session.current_devices());
                debug!(camera = ?devices.camera_id, microphone = ?devices.microphone_id,
                       "captured device ids from outgoing session");
            }
        }

        // 1. Stop and unpublish every locally published track.
        for kind in session.published_tracks() {
            if let Err(e) = session.unpublish_track(kind).await {
                warn!(track = %kind, error = %e, "failed to unpublish track during teardown");
            }
        }

        // 2. Disconnect (idempotent if already disconnected).
        session.disconnect().await;

        // 3. The handle clears when `session` drops at the end of this scope.

        // 4. Notify the backend that the room ended; fire-and-forget.
        if let Some(call_id) = ended_call {
            let signaling = self.signaling.clone();
            tokio::spawn(async move {
                if let Err(e) = signaling.end(call_id).await {
                    debug!(call_id, error = %e, "best-effort end notification failed");
                }
            });
        }

        // 5. Clear persisted in-call flags.
        if let Err(e) = self.flags.clear().await {
            warn!(error = %e, "failed to clear persisted in-call flag");
        }
    }
}
