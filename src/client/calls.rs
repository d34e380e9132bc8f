//! Call operations for the client-core library
//!
//! This module contains all call-related operations: starting outgoing
//! calls, answering or declining invitations, cancelling, hanging up, and
//! the dedicated status-poll loop that drives the outgoing-call half of the
//! state machine.
//!
//! # State Machine
//!
//! ```text
//!            start_call()                     status: answered
//!  (idle) ────────────────► Initiating ─► Calling ─────────────► Active
//!                                │            │                    │
//!                 start failed   │            │ status: rejected/  │ hangup /
//!                                ▼            │ cancelled/ended    │ status: ended
//!                            Cancelled ◄──────┘                    ▼
//!                                                               Ended
//!
//!  (idle) ──invitation──► Ringing ──answer(true)──► Active
//!                            │
//!                            └─answer(false) / caller gave up ─► Rejected/Cancelled
//! ```
//!
//! Terminal states release the current-call slot ("idle"); the records
//! remain as history.
//!
//! # The Graceful-Switch Rule
//!
//! Starting a call or accepting an invitation while another call exists
//! first winds the existing call fully down - caller-side cancel or
//! callee-side reject on the signaling side, and the complete media
//! teardown for an active session - before the new call transitions. Only
//! one call session ever exists, and switching is never a silent overwrite.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::call::{CallId, CallInfo, CallState, PeerInfo};
use crate::error::{ClientError, ClientResult};
use crate::events::{CallAction, ClientEvent, EventPriority, IncomingCallInfo};
use crate::signaling::types::{AnswerAction, Invitation, RemoteCallStatus};

use super::manager::{ClientManager, PendingInvitation};
use super::poller::backoff_factor;
use super::recovery::{retry_with_backoff, RetryConfig};

impl ClientManager {
    /// Start an outgoing call to `callee_id`
    ///
    /// Runs the graceful-switch rule for any existing call, performs the
    /// advisory balance check (which never blocks when the endpoint is
    /// unavailable), creates the call record and issues `start` with a
    /// quick retry policy. On success the call enters `Calling` and the
    /// status-poll loop takes over; on failure the record is closed out and
    /// the error is returned to the caller.
    ///
    /// # Errors
    ///
    /// * [`ClientError::InsufficientBalance`] - the backend refused the call
    /// * [`ClientError::AuthenticationRequired`] - credential missing/invalid
    /// * [`ClientError::NetworkError`] / [`ClientError::ConnectionTimeout`] -
    ///   transport failure after retries
    pub async fn start_call(self: &Arc<Self>, callee_id: &str) -> ClientResult<CallId> {
        if !*self.is_running.read().await {
            return Err(ClientError::InternalError {
                message: "Client is not started. Call start() before placing calls.".to_string(),
            });
        }

        // Graceful switch: fully wind down whatever call exists first.
        self.finish_existing_call("replaced by new outgoing call").await;

        // Advisory balance check. Only the backend's answer to `start` is
        // authoritative; an unavailable balance endpoint never blocks.
        match self.signaling.check_balance().await {
            Ok(Some(balance)) => {
                debug!(balance, "advisory balance check");
                if balance == 0 {
                    warn!("balance appears empty; proceeding, backend decides");
                }
            }
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "advisory balance check unavailable; proceeding");
            }
        }

        let call_id = uuid::Uuid::new_v4();
        let peer = PeerInfo { id: callee_id.to_string(), display_name: None };
        let mut info = CallInfo::outgoing(call_id, peer);
        info.metadata.insert("created_via".to_string(), "start_call".to_string());
        self.call_info.insert(call_id, info.clone());
        *self.current_call.write().await = Some(call_id);
        self.announce_new_call(&info, "call created").await;

        let call_type = self.config.call_type;
        let signaling = &self.signaling;
        let started = retry_with_backoff("start_call", RetryConfig::quick(), || async move {
            signaling.start(callee_id, call_type).await
        })
        .await;

        match started {
            Ok(started) => {
                if let Some(mut entry) = self.call_info.get_mut(&call_id) {
                    entry.signaling_call_id = Some(started.call_id);
                    entry.room = Some(started.room.clone());
                }
                self.transition_call(call_id, CallState::Calling, "start accepted").await;
                self.spawn_status_loop(call_id, started.call_id);
                info!(%call_id, signaling_call_id = started.call_id, callee = callee_id,
                      "outgoing call started");
                // A torn-down previous session may have changed eligibility.
                self.refresh_poller().await;
                Ok(call_id)
            }
            Err(e) => {
                warn!(%call_id, error = %e, "call start failed");
                self.transition_call(call_id, CallState::Cancelled, "start failed").await;
                self.emit(ClientEvent::Error {
                    message: format!("call start failed: {e}"),
                    call_id: Some(call_id),
                    priority: EventPriority::High,
                });
                self.refresh_poller().await;
                Err(e)
            }
        }
    }

    /// Answer the pending invitation
    ///
    /// `accept == true` accepts on the signaling side and then runs the
    /// media hand-off; a signaling failure leaves the client ringing and
    /// returns the error. `accept == false` issues exactly one best-effort
    /// reject - backend reachability never blocks the local intent to
    /// decline - and returns to idle.
    pub async fn answer_call(self: &Arc<Self>, accept: bool) -> ClientResult<()> {
        let pending = self.pending_invitation.read().await.clone();
        let Some(pending) = pending else {
            return Err(ClientError::InternalError {
                message: "no pending invitation to answer".to_string(),
            });
        };
        let signaling_call_id = pending.invitation.signaling_call_id;

        if !accept {
            if let Err(e) = self.signaling.answer(signaling_call_id, AnswerAction::Reject).await {
                warn!(signaling_call_id, error = %e, "reject signaling failed (ignored)");
            }
            self.clear_pending_invitation().await;
            let current = *self.current_call.read().await;
            if current == Some(pending.reserved_call_id) {
                if let Some(mut entry) = self.call_info.get_mut(&pending.reserved_call_id) {
                    entry.metadata.insert("declined_by".to_string(), "local_user".to_string());
                }
                self.transition_call(pending.reserved_call_id, CallState::Rejected, "declined by user")
                    .await;
            }
            return Ok(());
        }

        // Accept on the signaling side first; on failure the invitation
        // keeps ringing and the error surfaces to the caller.
        let outcome = self.signaling.answer(signaling_call_id, AnswerAction::Accept).await?;
        let room = outcome
            .room
            .clone()
            .unwrap_or_else(|| pending.invitation.room.clone());

        self.clear_pending_invitation().await;

        // Graceful switch: wind down any other call (including its media
        // session) strictly before the new call transitions and joins.
        let current = *self.current_call.read().await;
        if current.is_some() && current != Some(pending.reserved_call_id) {
            self.finish_existing_call("replaced by accepted incoming call").await;
        }

        let call_id = pending.reserved_call_id;
        if let Some(mut entry) = self.call_info.get_mut(&call_id) {
            if let Some(caller) = outcome.caller {
                entry.peer = caller;
            }
            entry.room = Some(room.clone());
        } else {
            let peer = outcome.caller.unwrap_or_else(|| pending.invitation.caller.clone());
            let mut info = CallInfo::incoming(call_id, peer, signaling_call_id, room.clone());
            info.metadata.insert("created_via".to_string(), "answer_call".to_string());
            self.call_info.insert(call_id, info);
        }
        *self.current_call.write().await = Some(call_id);
        self.transition_call(call_id, CallState::Active, "invitation accepted").await;

        // Hand-off: any remaining media session is torn down inside,
        // strictly before the join begins.
        match self.handoff.swap_to(&room, None).await {
            Ok(()) => {
                self.refresh_poller().await;
                Ok(())
            }
            Err(e) => {
                warn!(%call_id, error = %e, "media join failed after accept");
                self.handoff.teardown(Some(signaling_call_id)).await;
                self.transition_call(call_id, CallState::Ended, "media join failed").await;
                self.emit(ClientEvent::Error {
                    message: format!("media join failed: {e}"),
                    call_id: Some(call_id),
                    priority: EventPriority::High,
                });
                self.refresh_poller().await;
                Err(e)
            }
        }
    }

    /// Cancel the current outgoing call before it is answered
    ///
    /// The backend cancel is fire-and-forget: the local call ends whether
    /// or not the backend is reachable.
    pub async fn cancel_call(self: &Arc<Self>) -> ClientResult<()> {
        let current = *self.current_call.read().await;
        let Some(call_id) = current else { return Ok(()) };
        let Some(record) = self.call_info.get(&call_id).map(|e| e.value().clone()) else {
            return Ok(());
        };

        match record.state {
            CallState::Initiating | CallState::Calling => {
                self.abort_status_loop();
                if let Some(signaling_call_id) = record.signaling_call_id {
                    let signaling = self.signaling.clone();
                    tokio::spawn(async move {
                        if let Err(e) = signaling.cancel(signaling_call_id).await {
                            debug!(signaling_call_id, error = %e, "best-effort cancel failed");
                        }
                    });
                }
                self.transition_call(call_id, CallState::Cancelled, "cancelled by user").await;
                Ok(())
            }
            state => Err(ClientError::InvalidCallState { call_id, state }),
        }
    }

    /// Hang up the current call, whatever state it is in
    ///
    /// Idempotent: hanging up with no current call (or a call that already
    /// ended) succeeds without effect. A pending outgoing call is
    /// cancelled, a ringing invitation declined, an active call torn down.
    pub async fn hangup_call(self: &Arc<Self>) -> ClientResult<()> {
        let current = *self.current_call.read().await;
        let Some(call_id) = current else { return Ok(()) };
        let Some(record) = self.call_info.get(&call_id).map(|e| e.value().clone()) else {
            return Ok(());
        };

        match record.state {
            CallState::Active => {
                self.handoff.teardown(record.signaling_call_id).await;
                self.transition_call(call_id, CallState::Ended, "user hangup").await;
                self.refresh_poller().await;
                Ok(())
            }
            CallState::Initiating | CallState::Calling => self.cancel_call().await,
            CallState::Ringing => {
                self.finish_existing_call("declined by user").await;
                Ok(())
            }
            _ => {
                debug!(%call_id, state = %record.state, "hangup on terminated call ignored");
                Ok(())
            }
        }
    }

    /// Advisory: the media engine reported the last remote participant left
    ///
    /// Explicit signaling stays authoritative; this merely requests a
    /// normal hangup when the room is in fact empty.
    pub async fn peer_departed(self: &Arc<Self>) -> ClientResult<()> {
        if let Some(info) = self.current_call_info().await {
            if info.state == CallState::Active
                && self.handoff.remote_participants().await == Some(0)
            {
                info!(call_id = %info.call_id, "remote participant left; ending call");
                return self.hangup_call().await;
            }
        }
        Ok(())
    }

    /// Deliver an incoming-call invitation to the state machine
    ///
    /// This is the path every invitation takes, whether it came from the
    /// poller or from another host surface (push notification, deep link).
    /// The invitation passes echo suppression first; a duplicate of the one
    /// already pending is ignored.
    pub async fn receive_invitation(self: &Arc<Self>, invitation: Invitation) {
        // The same invitation is re-reported on every poll while it rings.
        if self.pending_invitation_id().await == Some(invitation.signaling_call_id) {
            return;
        }

        // A poll in flight while the user answered can re-report a call the
        // client already resolved; identity decides, not timing.
        let already_known = self.call_info.iter().any(|entry| {
            entry.value().signaling_call_id == Some(invitation.signaling_call_id)
        });
        if already_known {
            debug!(
                signaling_call_id = invitation.signaling_call_id,
                "invitation names a call already tracked; ignored"
            );
            return;
        }

        let snapshot = self.current_call_snapshot().await;
        if !super::echo::should_surface(&invitation, snapshot.as_ref(), &self.config.local_user_id)
        {
            debug!(
                signaling_call_id = invitation.signaling_call_id,
                caller = %invitation.caller.id,
                "invitation suppressed as echo or duplicate"
            );
            return;
        }

        self.surface_invitation(invitation).await;
    }

    // ===== INTERNALS =====

    /// Wind down whatever call is current, in the way its state demands
    ///
    /// Caller-side cancel for pending outgoing calls, callee-side reject
    /// for ringing invitations, full media teardown (with backend end
    /// notification) for active calls - always strictly before the caller
    /// proceeds with a new session.
    pub(crate) async fn finish_existing_call(self: &Arc<Self>, reason: &str) {
        self.clear_pending_invitation().await;

        let current = *self.current_call.read().await;
        let Some(call_id) = current else { return };
        let Some(record) = self.call_info.get(&call_id).map(|e| e.value().clone()) else {
            *self.current_call.write().await = None;
            return;
        };

        match record.state {
            CallState::Initiating | CallState::Calling => {
                self.abort_status_loop();
                if let Some(signaling_call_id) = record.signaling_call_id {
                    let signaling = self.signaling.clone();
                    tokio::spawn(async move {
                        if let Err(e) = signaling.cancel(signaling_call_id).await {
                            debug!(signaling_call_id, error = %e, "best-effort cancel failed");
                        }
                    });
                }
                self.transition_call(call_id, CallState::Cancelled, reason).await;
            }
            CallState::Ringing => {
                if let Some(signaling_call_id) = record.signaling_call_id {
                    let signaling = self.signaling.clone();
                    tokio::spawn(async move {
                        if let Err(e) = signaling.answer(signaling_call_id, AnswerAction::Reject).await {
                            debug!(signaling_call_id, error = %e, "best-effort reject failed");
                        }
                    });
                }
                self.transition_call(call_id, CallState::Rejected, reason).await;
            }
            CallState::Active => {
                // Full five-step teardown (unpublish, disconnect, clear
                // handle, notify backend, clear flags) before the record
                // transitions.
                self.handoff.teardown(record.signaling_call_id).await;
                self.transition_call(call_id, CallState::Ended, reason).await;
            }
            _ => {
                // Terminal record still occupying the slot; release it.
                let mut slot = self.current_call.write().await;
                if *slot == Some(call_id) {
                    *slot = None;
                }
            }
        }
    }

    /// Surface an invitation that passed echo suppression
    ///
    /// From idle this creates the ringing record; while another call exists
    /// the invitation is held pending the user's decision. Either way the
    /// incoming-call event fires and the handler may answer immediately.
    pub(crate) async fn surface_invitation(self: &Arc<Self>, invitation: Invitation) {
        let reserved_call_id = uuid::Uuid::new_v4();
        *self.pending_invitation.write().await = Some(PendingInvitation {
            invitation: invitation.clone(),
            reserved_call_id,
        });

        let idle = self.current_call.read().await.is_none();
        if idle {
            let info = CallInfo::incoming(
                reserved_call_id,
                invitation.caller.clone(),
                invitation.signaling_call_id,
                invitation.room.clone(),
            );
            self.call_info.insert(reserved_call_id, info.clone());
            *self.current_call.write().await = Some(reserved_call_id);
            self.announce_new_call(&info, "invitation surfaced").await;
        } else {
            debug!(
                signaling_call_id = invitation.signaling_call_id,
                "invitation surfaced while in another call; awaiting user decision"
            );
        }

        let incoming = IncomingCallInfo {
            call_id: reserved_call_id,
            signaling_call_id: invitation.signaling_call_id,
            peer: invitation.caller.clone(),
            room: invitation.room.clone(),
            created_at: Utc::now(),
        };
        self.emit(ClientEvent::IncomingCall {
            info: incoming.clone(),
            priority: EventPriority::High,
        });

        if let Some(handler) = self.handler().await {
            match handler.on_incoming_call(incoming).await {
                CallAction::Accept => {
                    if let Err(e) = self.answer_call(true).await {
                        warn!(error = %e, "handler-driven accept failed");
                    }
                }
                CallAction::Reject => {
                    if let Err(e) = self.answer_call(false).await {
                        warn!(error = %e, "handler-driven reject failed");
                    }
                }
                CallAction::Ignore => {}
            }
        }
    }

    /// Clear a ringing call whose caller the backend no longer reports
    pub(crate) async fn clear_stale_ringing(&self) {
        let current = *self.current_call.read().await;
        let Some(call_id) = current else { return };
        let state = self.call_info.get(&call_id).map(|e| e.value().state);
        if state == Some(CallState::Ringing) {
            info!(%call_id, "caller gave up; clearing stale ringing state");
            self.transition_call(call_id, CallState::Cancelled, "caller cancelled").await;
        }
    }

    /// Spawn the status-poll loop for an outgoing call in `Calling`
    ///
    /// Same discipline as the incoming poller: one request in flight at a
    /// time, transient errors feed the shared backoff formula, and the loop
    /// stops the moment the call leaves `Calling` for any reason.
    pub(crate) fn spawn_status_loop(self: &Arc<Self>, call_id: CallId, signaling_call_id: u64) {
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut consecutive_errors: u32 = 0;
            loop {
                let interval = match weak.upgrade() {
                    Some(manager) => manager.config.status_poll_interval.mul_f64(
                        backoff_factor(consecutive_errors, manager.config.poll_backoff_cap),
                    ),
                    None => return,
                };
                tokio::time::sleep(interval).await;

                let Some(manager) = weak.upgrade() else { return };
                let state = manager.call_info.get(&call_id).map(|e| e.value().state);
                if state != Some(CallState::Calling) {
                    return;
                }

                match manager.signaling.poll_status(signaling_call_id).await {
                    Ok(RemoteCallStatus::Pending) => {
                        consecutive_errors = 0;
                    }
                    Ok(RemoteCallStatus::Answered) => {
                        manager.on_remote_answered(call_id).await;
                        return;
                    }
                    Ok(RemoteCallStatus::Rejected) => {
                        manager
                            .transition_call(call_id, CallState::Rejected, "callee declined")
                            .await;
                        return;
                    }
                    Ok(RemoteCallStatus::Cancelled) => {
                        manager
                            .transition_call(call_id, CallState::Cancelled, "call cancelled")
                            .await;
                        return;
                    }
                    Ok(RemoteCallStatus::Ended) => {
                        manager.transition_call(call_id, CallState::Ended, "call ended").await;
                        return;
                    }
                    Err(ClientError::OperationCancelled) => {
                        // Deliberate cancellation; not an error.
                    }
                    Err(ClientError::SessionSuspended { .. }) => {
                        let manager = manager.clone();
                        tokio::spawn(async move {
                            manager.hard_reset("session suspended").await;
                        });
                        return;
                    }
                    Err(ClientError::AuthenticationRequired { reason }) => {
                        manager.auth_required(reason).await;
                        return;
                    }
                    Err(e) => {
                        consecutive_errors = consecutive_errors.saturating_add(1);
                        debug!(
                            error = %e,
                            consecutive_errors,
                            "status poll failed"
                        );
                    }
                }
            }
        });

        if let Some(previous) = self
            .status_task
            .lock()
            .expect("status slot poisoned")
            .replace(task)
        {
            previous.abort();
        }
    }

    /// The callee picked up: transition to active and run the hand-off
    pub(crate) async fn on_remote_answered(self: &Arc<Self>, call_id: CallId) {
        let Some(record) = self.call_info.get(&call_id).map(|e| e.value().clone()) else {
            return;
        };
        let Some(room) = record.room.clone() else {
            // Start stored the room; its absence here is a broken invariant.
            self.emit(ClientEvent::Error {
                message: "answered call has no room".to_string(),
                call_id: Some(call_id),
                priority: EventPriority::Critical,
            });
            self.hard_reset("answered call has no room").await;
            return;
        };

        self.transition_call(call_id, CallState::Active, "remote answered").await;

        match self.handoff.swap_to(&room, None).await {
            Ok(()) => {}
            Err(e) => {
                warn!(%call_id, error = %e, "media join failed after remote answer");
                self.handoff.teardown(record.signaling_call_id).await;
                self.transition_call(call_id, CallState::Ended, "media join failed").await;
                self.emit(ClientEvent::Error {
                    message: format!("media join failed: {e}"),
                    call_id: Some(call_id),
                    priority: EventPriority::High,
                });
            }
        }
        self.refresh_poller().await;
    }
}
