//! Call types for the client-core library
//!
//! This module defines the data model for the single call the local client
//! is party to: identifiers, lifecycle states, direction, peer identity and
//! the per-call record kept by the manager.
//!
//! # Call Lifecycle
//!
//! Caller path: `Initiating → Calling → Active → Ended`
//! Callee path: `Ringing → Active → Ended`
//! Either side: `Calling`/`Ringing → Cancelled`/`Rejected`
//!
//! Terminal states (`Rejected`, `Cancelled`, `Ended`) release the
//! current-call slot; the record itself is retained as history.
//!
//! # Usage Examples
//!
//! ```rust
//! use livecall_client_core::call::{CallState, CallDirection};
//!
//! let state = CallState::Calling;
//! assert!(!state.is_terminal());
//! assert!(CallState::Rejected.is_terminal());
//!
//! println!("{} call is {}", CallDirection::Outgoing, state);
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a call, assigned locally by the client
///
/// The backend's own numeric call id is carried separately on the call
/// record ([`CallInfo::signaling_call_id`]) once signaling has accepted the
/// call.
pub type CallId = uuid::Uuid;

/// Opaque media-session handle returned by the signaling backend
///
/// Populated when a call start is accepted (caller side) or when an answer
/// succeeds (callee side) and consumed by the media hand-off when joining.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    /// The raw room identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        RoomId(s.to_string())
    }
}

/// The remote party of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Opaque backend identifier of the peer
    pub id: String,
    /// Human-readable name, if the backend provided one
    pub display_name: Option<String>,
}

impl PeerInfo {
    /// Name suitable for display, falling back to the id
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Direction of a call relative to the local client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    /// The local user started the call (role: caller)
    Outgoing,
    /// The call was reported by the incoming-call poller (role: callee)
    Incoming,
}

impl std::fmt::Display for CallDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallDirection::Outgoing => write!(f, "outgoing"),
            CallDirection::Incoming => write!(f, "incoming"),
        }
    }
}

/// Lifecycle state of a call
///
/// "Idle" is represented by the absence of a current call rather than a
/// state of its own: a record in a terminal state has already released the
/// current-call slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// Outgoing call created locally, start request not yet accepted
    Initiating,
    /// Start request accepted, waiting for the callee to pick up
    Calling,
    /// Incoming invitation surfaced, waiting for the local user to answer
    Ringing,
    /// Both parties joined; media session is (being) established
    Active,
    /// The remote side declined, or the local user declined an invitation
    Rejected,
    /// The call was cancelled before it became active
    Cancelled,
    /// The call ended after having been active
    Ended,
}

impl CallState {
    /// Whether this state is terminal (the call is over)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallState::Rejected | CallState::Cancelled | CallState::Ended
        )
    }

    /// Whether the call is still waiting for the remote side
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            CallState::Initiating | CallState::Calling | CallState::Ringing
        )
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallState::Initiating => write!(f, "initiating"),
            CallState::Calling => write!(f, "calling"),
            CallState::Ringing => write!(f, "ringing"),
            CallState::Active => write!(f, "active"),
            CallState::Rejected => write!(f, "rejected"),
            CallState::Cancelled => write!(f, "cancelled"),
            CallState::Ended => write!(f, "ended"),
        }
    }
}

/// Complete record of a call known to the client
///
/// Created by the manager when a call starts or an invitation is accepted
/// for surfacing, mutated only through the manager's transition helper, and
/// retained as history after the call reaches a terminal state.
#[derive(Debug, Clone)]
pub struct CallInfo {
    /// Local identifier for this call
    pub call_id: CallId,
    /// Current lifecycle state
    pub state: CallState,
    /// Whether the local user is caller or callee
    pub direction: CallDirection,
    /// The remote party
    pub peer: PeerInfo,
    /// Backend call id, present once signaling accepted the call
    pub signaling_call_id: Option<u64>,
    /// Media room handle, present once known (start response or answer)
    pub room: Option<RoomId>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the call became active (if it did)
    pub connected_at: Option<DateTime<Utc>>,
    /// When the call reached a terminal state (if it has)
    pub ended_at: Option<DateTime<Utc>>,
    /// Free-form bookkeeping (creation path, decline reasons, ...)
    pub metadata: HashMap<String, String>,
}

impl CallInfo {
    /// Create a fresh outgoing call record in the `Initiating` state
    pub fn outgoing(call_id: CallId, peer: PeerInfo) -> Self {
        Self {
            call_id,
            state: CallState::Initiating,
            direction: CallDirection::Outgoing,
            peer,
            signaling_call_id: None,
            room: None,
            created_at: Utc::now(),
            connected_at: None,
            ended_at: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a fresh incoming call record in the `Ringing` state
    pub fn incoming(call_id: CallId, peer: PeerInfo, signaling_call_id: u64, room: RoomId) -> Self {
        Self {
            call_id,
            state: CallState::Ringing,
            direction: CallDirection::Incoming,
            peer,
            signaling_call_id: Some(signaling_call_id),
            room: Some(room),
            created_at: Utc::now(),
            connected_at: None,
            ended_at: None,
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        for state in [CallState::Rejected, CallState::Cancelled, CallState::Ended] {
            assert!(state.is_terminal());
            assert!(!state.is_pending());
        }
        for state in [CallState::Initiating, CallState::Calling, CallState::Ringing] {
            assert!(!state.is_terminal());
            assert!(state.is_pending());
        }
        assert!(!CallState::Active.is_terminal());
        assert!(!CallState::Active.is_pending());
    }

    #[test]
    fn peer_label_falls_back_to_id() {
        let anonymous = PeerInfo { id: "u-77".into(), display_name: None };
        assert_eq!(anonymous.label(), "u-77");

        let named = PeerInfo { id: "u-77".into(), display_name: Some("Dana".into()) };
        assert_eq!(named.label(), "Dana");
    }

    #[test]
    fn incoming_record_carries_invitation_details() {
        let peer = PeerInfo { id: "u-9".into(), display_name: Some("Ari".into()) };
        let info = CallInfo::incoming(uuid::Uuid::new_v4(), peer, 42, RoomId::from("room-a"));
        assert_eq!(info.state, CallState::Ringing);
        assert_eq!(info.direction, CallDirection::Incoming);
        assert_eq!(info.signaling_call_id, Some(42));
        assert_eq!(info.room.as_ref().map(|r| r.as_str()), Some("room-a"));
    }
}
