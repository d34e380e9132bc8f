//! Client manager: the owning facade of the coordination layer
//!
//! `ClientManager` owns every piece of mutable state in the crate: the
//! call records and the single current-call slot, the pending invitation,
//! the device selection, the application mode, and the handles of the two
//! polling loops. It is the only writer of call state; every transition
//! funnels through [`ClientManager::transition_call`], which also drives
//! side effects and event emission.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use livecall_client_core::{ClientBuilder, ClientConfig};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     http: Arc<dyn livecall_client_core::signaling::http::HttpClient>,
//! #     engine: Arc<dyn livecall_client_core::media::MediaEngine>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("https://backend.example/api/calls/", "u-100")?
//!     .with_bearer_token("secret");
//! let client = ClientBuilder::new(config)
//!     .http_client(http)
//!     .media_engine(engine)
//!     .build()?;
//!
//! client.start().await?;
//! let call_id = client.start_call("u-200").await?;
//! println!("calling, local id {call_id}");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::call::{CallId, CallInfo, CallState};
use crate::error::{ClientError, ClientResult};
use crate::events::{CallStatusInfo, ClientEvent, ClientEventHandler, EventPriority};
use crate::media::{CallFlagStore, DeviceSelection};
use crate::signaling::types::Invitation;
use crate::signaling::{RequestKind, SignalingClient};

use super::cues::SideEffectManager;
use super::echo::CurrentCallSnapshot;
use super::handoff::MediaSessionHandoff;
use super::poller::IncomingCallPoller;
use super::ClientConfig;

/// Application mode, as far as polling eligibility is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    /// Normal operation; polling runs
    Normal,
    /// The host is inside an authentication flow; polling is suspended
    Authenticating,
    /// The session was suspended by the backend; polling is suspended
    Suspended,
}

/// An invitation that passed echo suppression and awaits an answer
#[derive(Debug, Clone)]
pub(crate) struct PendingInvitation {
    /// The invitation as reported by the backend
    pub(crate) invitation: Invitation,
    /// Local call id reserved for the record this invitation may become
    pub(crate) reserved_call_id: CallId,
}

/// Statistics about the client's current state and activity
#[derive(Debug, Clone)]
pub struct ClientStats {
    /// Whether the client is currently running and polling
    pub is_running: bool,
    /// Total number of calls tracked since the client started
    pub total_calls: usize,
    /// The current (non-terminal) call, if any
    pub current_call: Option<CallId>,
    /// Whether a media session is live
    pub in_media_session: bool,
}

/// The owning facade of the call coordination layer
///
/// Construct through [`crate::client::ClientBuilder`]; the manager is
/// always used behind an [`Arc`] because its loops hold weak references to
/// it.
pub struct ClientManager {
    pub(crate) config: ClientConfig,
    pub(crate) signaling: Arc<SignalingClient>,
    pub(crate) handoff: MediaSessionHandoff,
    pub(crate) side_effects: SideEffectManager,
    pub(crate) flags: Arc<dyn CallFlagStore>,
    pub(crate) devices: Arc<RwLock<DeviceSelection>>,

    /// Every call this client has tracked, current and historical
    pub(crate) call_info: DashMap<CallId, CallInfo>,
    /// The single current call; `None` means idle
    pub(crate) current_call: RwLock<Option<CallId>>,
    /// Invitation surfaced but not yet answered
    pub(crate) pending_invitation: RwLock<Option<PendingInvitation>>,

    pub(crate) mode: RwLock<ClientMode>,
    pub(crate) is_running: RwLock<bool>,

    pub(crate) event_tx: broadcast::Sender<ClientEvent>,
    pub(crate) event_handler: RwLock<Option<Arc<dyn ClientEventHandler>>>,

    pub(crate) poller_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    pub(crate) status_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ClientManager {
    /// Assemble a manager from its parts; called by the builder
    pub(crate) fn from_parts(
        config: ClientConfig,
        signaling: Arc<SignalingClient>,
        handoff: MediaSessionHandoff,
        side_effects: SideEffectManager,
        flags: Arc<dyn CallFlagStore>,
        devices: Arc<RwLock<DeviceSelection>>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            config,
            signaling,
            handoff,
            side_effects,
            flags,
            devices,
            call_info: DashMap::new(),
            current_call: RwLock::new(None),
            pending_invitation: RwLock::new(None),
            mode: RwLock::new(ClientMode::Normal),
            is_running: RwLock::new(false),
            event_tx,
            event_handler: RwLock::new(None),
            poller_task: std::sync::Mutex::new(None),
            status_task: std::sync::Mutex::new(None),
        })
    }
}

impl std::fmt::Debug for ClientManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientManager").finish_non_exhaustive()
    }
}

impl ClientManager {

    /// Start the client: polling begins if the mode allows it
    pub async fn start(self: &Arc<Self>) -> ClientResult<()> {
        {
            let mut running = self.is_running.write().await;
            if *running {
                return Ok(());
            }
            *running = true;
        }
        info!(user = %self.config.local_user_id, "client started");
        self.refresh_poller().await;
        Ok(())
    }

    /// Stop the client: loops disarmed, in-flight requests cancelled, any
    /// current call wound down gracefully
    pub async fn stop(self: &Arc<Self>) {
        {
            let mut running = self.is_running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }
        self.abort_status_loop();
        if let Some(task) = self.poller_task.lock().expect("poller slot poisoned").take() {
            task.abort();
        }
        self.finish_existing_call("client stopped").await;
        self.signaling.cancel_all();
        self.side_effects.silence().await;
        self.clear_pending_invitation().await;
        info!("client stopped");
    }

    // ===== EVENTS =====

    /// Subscribe to the client event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    /// Install (or replace) the async event handler
    pub async fn set_event_handler(&self, handler: Arc<dyn ClientEventHandler>) {
        *self.event_handler.write().await = Some(handler);
    }

    pub(crate) async fn handler(&self) -> Option<Arc<dyn ClientEventHandler>> {
        self.event_handler.read().await.clone()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event);
    }

    // ===== MODE AND ELIGIBILITY =====

    /// Current application mode
    pub async fn mode(&self) -> ClientMode {
        *self.mode.read().await
    }

    /// Change the application mode, re-arming or disarming the poller
    pub async fn set_mode(self: &Arc<Self>, mode: ClientMode) {
        {
            let mut current = self.mode.write().await;
            if *current == mode {
                return;
            }
            *current = mode;
        }
        debug!(mode = ?mode, "client mode changed");
        self.refresh_poller().await;
    }

    /// Whether the incoming-call poller may run right now
    ///
    /// Polling is suspended while a media session is live or while the
    /// client is outside the normal mode; both are re-read on every tick.
    pub async fn poll_eligible(&self) -> bool {
        *self.is_running.read().await
            && *self.mode.read().await == ClientMode::Normal
            && !self.handoff.is_in_session()
    }

    /// Arm or disarm the poll task to match current eligibility
    pub(crate) async fn refresh_poller(self: &Arc<Self>) {
        let eligible = self.poll_eligible().await;
        let mut slot = self.poller_task.lock().expect("poller slot poisoned");
        if eligible {
            let needs_spawn = slot.as_ref().map(|t| t.is_finished()).unwrap_or(true);
            if needs_spawn {
                debug!("arming incoming-call poller");
                *slot = Some(IncomingCallPoller::spawn(self));
            }
        } else if let Some(task) = slot.take() {
            debug!("disarming incoming-call poller");
            task.abort();
            self.signaling.cancel_kind(RequestKind::PollIncoming);
        }
    }

    pub(crate) fn abort_status_loop(&self) {
        if let Some(task) = self.status_task.lock().expect("status slot poisoned").take() {
            task.abort();
            self.signaling.cancel_kind(RequestKind::PollStatus);
        }
    }

    // ===== DEVICES =====

    /// Replace the preferred capture devices
    pub async fn set_device_selection(&self, devices: DeviceSelection) {
        *self.devices.write().await = devices;
    }

    /// The preferred capture devices
    pub async fn device_selection(&self) -> DeviceSelection {
        self.devices.read().await.clone()
    }

    // ===== CALL STATE ACCESS =====

    /// Get the record of a specific call
    pub async fn get_call(&self, call_id: &CallId) -> ClientResult<CallInfo> {
        self.call_info
            .get(call_id)
            .map(|entry| entry.value().clone())
            .ok_or(ClientError::CallNotFound { call_id: *call_id })
    }

    /// The current (non-terminal) call, if any
    pub async fn current_call_info(&self) -> Option<CallInfo> {
        let current = *self.current_call.read().await;
        current.and_then(|id| self.call_info.get(&id).map(|e| e.value().clone()))
    }

    /// All calls known to the client, current and historical
    pub async fn list_calls(&self) -> Vec<CallInfo> {
        self.call_info.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Calls that have reached a terminal state
    pub async fn get_call_history(&self) -> Vec<CallInfo> {
        self.call_info
            .iter()
            .filter(|entry| entry.value().state.is_terminal())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Statistics recalculated from the actual call records
    pub async fn get_client_stats(&self) -> ClientStats {
        ClientStats {
            is_running: *self.is_running.read().await,
            total_calls: self.call_info.len(),
            current_call: *self.current_call.read().await,
            in_media_session: self.handoff.is_in_session(),
        }
    }

    /// Snapshot of the current call for echo suppression
    pub(crate) async fn current_call_snapshot(&self) -> Option<CurrentCallSnapshot> {
        let current = *self.current_call.read().await;
        current.and_then(|id| {
            self.call_info.get(&id).map(|entry| CurrentCallSnapshot {
                signaling_call_id: entry.signaling_call_id,
                state: entry.state,
            })
        })
    }

    // ===== PENDING INVITATION =====

    pub(crate) async fn pending_invitation_id(&self) -> Option<u64> {
        self.pending_invitation
            .read()
            .await
            .as_ref()
            .map(|p| p.invitation.signaling_call_id)
    }

    pub(crate) async fn clear_pending_invitation(&self) {
        self.pending_invitation.write().await.take();
    }

    // ===== TRANSITIONS =====

    /// Emit creation side effects and events for a freshly inserted record
    pub(crate) async fn announce_new_call(&self, info: &CallInfo, reason: &str) {
        self.side_effects.on_transition(None, info.state, info).await;
        let status = CallStatusInfo {
            call_id: info.call_id,
            new_state: info.state,
            previous_state: None,
            reason: Some(reason.to_string()),
            timestamp: Utc::now(),
        };
        self.emit(ClientEvent::CallStateChanged {
            info: status.clone(),
            priority: EventPriority::Normal,
        });
        if let Some(handler) = self.handler().await {
            handler.on_call_state_changed(status).await;
        }
    }

    /// The single mutation path for call state
    ///
    /// Updates the record, maintains the current-call slot, drives side
    /// effects and emits the state-change event. A no-op when the call is
    /// unknown or already in `new_state`.
    pub(crate) async fn transition_call(&self, call_id: CallId, new_state: CallState, reason: &str) {
        let (previous, info) = {
            let Some(mut entry) = self.call_info.get_mut(&call_id) else {
                debug!(%call_id, target_state = %new_state, "transition for unknown call ignored");
                return;
            };
            let previous = entry.state;
            if previous == new_state {
                return;
            }
            entry.state = new_state;
            if new_state == CallState::Active {
                entry.connected_at = Some(Utc::now());
            }
            if new_state.is_terminal() {
                entry.ended_at = Some(Utc::now());
            }
            (previous, entry.value().clone())
        };

        info!(%call_id, from = %previous, to = %new_state, reason, "call state transition");

        if new_state.is_terminal() {
            let mut current = self.current_call.write().await;
            if *current == Some(call_id) {
                // Terminal states auto-reset to idle.
                *current = None;
            }
            drop(current);
            self.prune_history();
        }

        self.side_effects.on_transition(Some(previous), new_state, &info).await;

        let status = CallStatusInfo {
            call_id,
            new_state,
            previous_state: Some(previous),
            reason: Some(reason.to_string()),
            timestamp: Utc::now(),
        };
        self.emit(ClientEvent::CallStateChanged {
            info: status.clone(),
            priority: EventPriority::Normal,
        });
        if let Some(handler) = self.handler().await {
            handler.on_call_state_changed(status).await;
        }
    }

    /// Drop the oldest terminal records beyond the configured history size
    fn prune_history(&self) {
        let max = self.config.max_call_history;
        if self.call_info.len() <= max {
            return;
        }
        let mut terminal: Vec<(CallId, chrono::DateTime<Utc>)> = self
            .call_info
            .iter()
            .filter(|entry| entry.value().state.is_terminal())
            .map(|entry| {
                let value = entry.value();
                (value.call_id, value.ended_at.unwrap_or(value.created_at))
            })
            .collect();
        terminal.sort_by_key(|(_, ended)| *ended);
        let excess = self.call_info.len().saturating_sub(max);
        for (call_id, _) in terminal.into_iter().take(excess) {
            self.call_info.remove(&call_id);
        }
    }

    // ===== RESET PATHS =====

    /// Surface an authentication demand; the poller has already stopped
    pub(crate) async fn auth_required(&self, reason: String) {
        self.emit(ClientEvent::AuthenticationRequired {
            reason: reason.clone(),
            priority: EventPriority::High,
        });
        if let Some(handler) = self.handler().await {
            handler.on_authentication_required(reason).await;
        }
    }

    /// Hard client reset: clear all local and persisted state
    ///
    /// Triggered by a suspended session or a detected invariant violation.
    /// After the reset the client is in [`ClientMode::Suspended`] with no
    /// credential; the host must re-authenticate and call
    /// [`ClientManager::set_mode`] to resume.
    pub async fn hard_reset(&self, reason: &str) {
        warn!(reason, "performing hard client reset");

        *self.mode.write().await = ClientMode::Suspended;
        self.abort_status_loop();
        if let Some(task) = self.poller_task.lock().expect("poller slot poisoned").take() {
            task.abort();
        }
        self.signaling.cancel_all();
        self.signaling.set_bearer_token(None);

        self.handoff.teardown(None).await;
        if let Err(e) = self.flags.clear().await {
            debug!(error = %e, "failed to clear persisted flags during reset");
        }

        self.call_info.clear();
        *self.current_call.write().await = None;
        self.clear_pending_invitation().await;
        self.side_effects.silence().await;

        self.emit(ClientEvent::ClientReset {
            reason: reason.to_string(),
            priority: EventPriority::Critical,
        });
        if let Some(handler) = self.handler().await {
            handler.on_client_reset(reason.to_string()).await;
        }
    }

    /// Provide a fresh credential after a reset or login
    pub async fn set_bearer_token(&self, token: Option<String>) {
        self.signaling.set_bearer_token(token);
    }
}
