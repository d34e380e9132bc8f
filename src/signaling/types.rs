//! Wire types for the signaling backend JSON contract
//!
//! Field names follow the backend's snake_case JSON exactly; the richer
//! domain types (`PeerInfo`, `RoomId`, `Invitation`) are produced by the
//! conversion helpers at the bottom.

use serde::{Deserialize, Serialize};

use crate::call::{PeerInfo, RoomId};

/// Kind of call requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// Camera + microphone
    Video,
    /// Microphone only
    Audio,
}

impl Default for CallKind {
    fn default() -> Self {
        CallKind::Video
    }
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallKind::Video => write!(f, "video"),
            CallKind::Audio => write!(f, "audio"),
        }
    }
}

/// `POST start` request body
#[derive(Debug, Clone, Serialize)]
pub struct StartRequest {
    /// Backend id of the user being called
    pub receiver_id: String,
    /// Requested call kind
    pub call_type: CallKind,
}

/// `POST start` response body
#[derive(Debug, Clone, Deserialize)]
pub struct StartResponse {
    /// Whether the backend accepted the call
    pub success: bool,
    /// Backend call id, present on success
    pub call_id: Option<u64>,
    /// Media room handle, present on success
    pub room_name: Option<String>,
    /// Machine-readable failure code, present on refusal
    pub error_code: Option<String>,
    /// Human-readable failure detail
    pub message: Option<String>,
}

/// Action taken on an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerAction {
    /// Accept the call
    Accept,
    /// Decline the call
    Reject,
}

/// `POST answer` request body
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRequest {
    /// Backend call id being answered
    pub call_id: u64,
    /// Accept or reject
    pub action: AnswerAction,
}

/// Peer identity as the backend sends it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerWire {
    /// Backend user id
    pub id: String,
    /// Display name, if set
    pub name: Option<String>,
}

impl From<PeerWire> for PeerInfo {
    fn from(wire: PeerWire) -> Self {
        PeerInfo { id: wire.id, display_name: wire.name }
    }
}

/// `POST answer` response body
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerResponse {
    /// Whether the backend recorded the answer
    pub success: bool,
    /// Media room handle, present when accepting succeeded
    pub room_name: Option<String>,
    /// The caller's identity, echoed back
    pub caller: Option<PeerWire>,
}

/// `POST cancel` / `POST end` request body
#[derive(Debug, Clone, Serialize)]
pub struct CallRef {
    /// Backend call id
    pub call_id: u64,
}

/// Generic `{success}` acknowledgement body
#[derive(Debug, Clone, Deserialize)]
pub struct AckResponse {
    /// Whether the backend accepted the request
    pub success: bool,
}

/// Invitation payload inside `GET check-incoming`
#[derive(Debug, Clone, Deserialize)]
pub struct InvitationWire {
    /// Backend call id
    pub id: u64,
    /// Who is calling
    pub caller: PeerWire,
    /// Media room to join on accept
    pub room_name: String,
}

/// `GET check-incoming` response body
#[derive(Debug, Clone, Deserialize)]
pub struct CheckIncomingResponse {
    /// Whether someone is calling the local user
    pub has_incoming: bool,
    /// The invitation, present when `has_incoming` is true
    pub incoming_call: Option<InvitationWire>,
}

/// `POST status` request body
pub type StatusRequest = CallRef;

/// Call object inside `POST status`
#[derive(Debug, Clone, Deserialize)]
pub struct CallStatusWire {
    /// Backend call status string
    pub status: WireCallStatus,
}

/// `POST status` response body
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    /// The call row, absent if the backend no longer knows the call
    pub call: Option<CallStatusWire>,
}

/// Backend call status values
///
/// Unknown strings deserialize to [`WireCallStatus::Unknown`], which the
/// client treats as "still pending" per the backend contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireCallStatus {
    /// Start accepted, callee not yet notified
    Initiating,
    /// Callee is being alerted
    Calling,
    /// Callee-side overlay is showing
    Ringing,
    /// Callee accepted
    Active,
    /// Callee accepted (legacy spelling)
    Answered,
    /// Callee declined
    Rejected,
    /// Caller gave up before an answer
    Cancelled,
    /// Call finished after being active
    Ended,
    /// Any other value
    #[serde(other)]
    Unknown,
}

/// Remote status of an outgoing call, as the status-poll loop consumes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCallStatus {
    /// Still waiting on the callee (includes unknown/absent statuses)
    Pending,
    /// The callee accepted; proceed to the media hand-off
    Answered,
    /// The callee declined
    Rejected,
    /// The call was cancelled
    Cancelled,
    /// The call is over
    Ended,
}

impl From<WireCallStatus> for RemoteCallStatus {
    fn from(wire: WireCallStatus) -> Self {
        match wire {
            WireCallStatus::Active | WireCallStatus::Answered => RemoteCallStatus::Answered,
            WireCallStatus::Rejected => RemoteCallStatus::Rejected,
            WireCallStatus::Cancelled => RemoteCallStatus::Cancelled,
            WireCallStatus::Ended => RemoteCallStatus::Ended,
            WireCallStatus::Initiating
            | WireCallStatus::Calling
            | WireCallStatus::Ringing
            | WireCallStatus::Unknown => RemoteCallStatus::Pending,
        }
    }
}

/// `GET balance` response body (advisory pre-check)
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Remaining balance, in backend units
    pub balance: Option<u64>,
}

/// Error body shape used by 4xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable failure code
    pub error_code: Option<String>,
    /// Human-readable detail
    pub message: Option<String>,
}

/// An incoming-call invitation in domain terms
#[derive(Debug, Clone, PartialEq)]
pub struct Invitation {
    /// Backend call id
    pub signaling_call_id: u64,
    /// Who is calling
    pub caller: PeerInfo,
    /// Media room to join on accept
    pub room: RoomId,
}

impl From<InvitationWire> for Invitation {
    fn from(wire: InvitationWire) -> Self {
        Invitation {
            signaling_call_id: wire.id,
            caller: wire.caller.into(),
            room: RoomId(wire.room_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_maps_to_pending() {
        let parsed: StatusResponse =
            serde_json::from_str(r#"{"call":{"status":"reconnecting"}}"#).unwrap();
        let status = parsed.call.map(|c| RemoteCallStatus::from(c.status));
        assert_eq!(status, Some(RemoteCallStatus::Pending));
    }

    #[test]
    fn answered_and_active_are_equivalent() {
        for raw in [r#"{"call":{"status":"active"}}"#, r#"{"call":{"status":"answered"}}"#] {
            let parsed: StatusResponse = serde_json::from_str(raw).unwrap();
            assert_eq!(
                parsed.call.map(|c| RemoteCallStatus::from(c.status)),
                Some(RemoteCallStatus::Answered)
            );
        }
    }

    #[test]
    fn invitation_converts_to_domain() {
        let parsed: CheckIncomingResponse = serde_json::from_str(
            r#"{"has_incoming":true,"incoming_call":{"id":7,"caller":{"id":"u-3","name":"Kim"},"room_name":"room-x"}}"#,
        )
        .unwrap();
        let invitation: Invitation = parsed.incoming_call.unwrap().into();
        assert_eq!(invitation.signaling_call_id, 7);
        assert_eq!(invitation.caller.id, "u-3");
        assert_eq!(invitation.caller.display_name.as_deref(), Some("Kim"));
        assert_eq!(invitation.room.as_str(), "room-x");
    }

    #[test]
    fn start_request_serializes_snake_case() {
        let body = serde_json::to_value(StartRequest {
            receiver_id: "u-5".into(),
            call_type: CallKind::Video,
        })
        .unwrap();
        assert_eq!(body["receiver_id"], "u-5");
        assert_eq!(body["call_type"], "video");
    }
}
