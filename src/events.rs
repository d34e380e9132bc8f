//! Event handling for client-core operations
//!
//! This module provides the event surface of the coordination layer: call
//! state transitions, surfaced incoming invitations, authentication
//! demands and client errors. Events are delivered two ways, exactly one of
//! which is required:
//!
//! - a broadcast channel ([`crate::client::ClientManager::subscribe_events`])
//!   for UI layers that want a stream, and
//! - an optional async [`ClientEventHandler`] for hosts that prefer
//!   callbacks (and want a say in how invitations are handled).
//!
//! # Usage Examples
//!
//! ## Basic Event Handler
//!
//! ```rust
//! use livecall_client_core::events::{
//!     CallAction, CallStatusInfo, ClientEventHandler, IncomingCallInfo,
//! };
//! use async_trait::async_trait;
//!
//! struct MyEventHandler;
//!
//! #[async_trait]
//! impl ClientEventHandler for MyEventHandler {
//!     async fn on_incoming_call(&self, info: IncomingCallInfo) -> CallAction {
//!         println!("incoming call from {}", info.peer.label());
//!         CallAction::Ignore // leave the decision to the UI overlay
//!     }
//!
//!     async fn on_call_state_changed(&self, info: CallStatusInfo) {
//!         println!("call {} is now {}", info.call_id, info.new_state);
//!     }
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::call::{CallId, CallState, PeerInfo, RoomId};

/// Action to take for a surfaced incoming call
///
/// Returned by [`ClientEventHandler::on_incoming_call`]. `Ignore` leaves the
/// call ringing for the UI surface to answer explicitly; `Accept`/`Reject`
/// let a host policy answer immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    /// Accept the invitation immediately
    Accept,
    /// Decline the invitation immediately
    Reject,
    /// Leave the invitation ringing; the host answers later
    Ignore,
}

/// Information about a surfaced incoming call
#[derive(Debug, Clone)]
pub struct IncomingCallInfo {
    /// Local identifier assigned to the (prospective) call
    pub call_id: CallId,
    /// Backend call id from the invitation
    pub signaling_call_id: u64,
    /// Who is calling
    pub peer: PeerInfo,
    /// Media room to join if the call is accepted
    pub room: RoomId,
    /// When the invitation was surfaced
    pub created_at: DateTime<Utc>,
}

/// Information about a call state change
#[derive(Debug, Clone)]
pub struct CallStatusInfo {
    /// Call that changed state
    pub call_id: CallId,
    /// New call state after the transition
    pub new_state: CallState,
    /// Previous call state before the transition (if known)
    pub previous_state: Option<CallState>,
    /// Reason for the state change (e.g. "remote answered", "user cancel")
    pub reason: Option<String>,
    /// When the state change occurred
    pub timestamp: DateTime<Utc>,
}

/// Event priority levels for filtering and handling
///
/// ```rust
/// use livecall_client_core::events::EventPriority;
///
/// assert!(EventPriority::Critical > EventPriority::High);
/// assert!(EventPriority::High > EventPriority::Normal);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    /// Routine status changes
    Low,
    /// State transitions
    Normal,
    /// Incoming calls, authentication demands
    High,
    /// Failures and forced resets
    Critical,
}

/// Unified event type emitted on the manager's broadcast channel
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A call transitioned between lifecycle states
    CallStateChanged {
        /// Transition details
        info: CallStatusInfo,
        /// Priority for filtering
        priority: EventPriority,
    },
    /// An incoming invitation passed echo suppression and was surfaced
    IncomingCall {
        /// Invitation details
        info: IncomingCallInfo,
        /// Priority for filtering
        priority: EventPriority,
    },
    /// The backend demands (re-)authentication; polling has stopped
    AuthenticationRequired {
        /// Backend-provided detail
        reason: String,
        /// Priority for filtering
        priority: EventPriority,
    },
    /// The client performed a hard reset (session suspended or invariant)
    ClientReset {
        /// Why the reset happened
        reason: String,
        /// Priority for filtering
        priority: EventPriority,
    },
    /// A non-fatal error the host may want to surface
    Error {
        /// Description of the failure
        message: String,
        /// The related call, if any
        call_id: Option<CallId>,
        /// Priority for filtering
        priority: EventPriority,
    },
}

/// Async callback surface for host applications
///
/// All methods have default no-op implementations except
/// [`ClientEventHandler::on_incoming_call`], whose return value decides how
/// a surfaced invitation is handled.
#[async_trait]
pub trait ClientEventHandler: Send + Sync {
    /// Called when an invitation passes echo suppression
    async fn on_incoming_call(&self, info: IncomingCallInfo) -> CallAction;

    /// Called on every call state transition
    async fn on_call_state_changed(&self, _info: CallStatusInfo) {}

    /// Called when polling stopped because the backend demands a login
    async fn on_authentication_required(&self, _reason: String) {}

    /// Called after a hard client reset completed
    async fn on_client_reset(&self, _reason: String) {}

    /// Called for non-fatal errors worth surfacing
    async fn on_error(&self, _message: String, _call_id: Option<CallId>) {}
}
