//! Echo suppression for incoming-call poll results
//!
//! Polling gives no causal ordering between "I started a call" and "the
//! poll observed that call as incoming": right after the local user starts
//! an outgoing call, the backend may briefly report that very call back as
//! an incoming one. Suppression is therefore identity-based, never
//! timing-based: an invitation is dropped when it names the call the client
//! already knows, or names the local user as its caller.

use crate::call::CallState;
use crate::signaling::types::Invitation;

/// Snapshot of the current call, as the suppressor needs it
///
/// Taken by the poller right before filtering, so the decision always uses
/// the state at delivery time rather than anything captured at spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentCallSnapshot {
    /// Backend call id of the current call, once signaling assigned one
    pub signaling_call_id: Option<u64>,
    /// State of the current call
    pub state: CallState,
}

/// Decide whether a reported invitation should be surfaced to the user
///
/// Returns false when:
/// - the invitation names the call the client is already party to,
///   regardless of who initiated it;
/// - the invitation reports the local user as the caller (an echo of an
///   outgoing call not yet reflected in local state);
/// - the client is already ringing for a different invitation (first one
///   wins; the stale ringing is cleared separately when the poll next
///   reports nothing incoming).
///
/// # Examples
///
/// ```rust
/// use livecall_client_core::call::PeerInfo;
/// use livecall_client_core::client::echo::should_surface;
/// use livecall_client_core::signaling::types::Invitation;
///
/// let invitation = Invitation {
///     signaling_call_id: 7,
///     caller: PeerInfo { id: "u-1".to_string(), display_name: None },
///     room: "room-7".into(),
/// };
///
/// // The local user is reported as the caller: an echo, never surfaced.
/// assert!(!should_surface(&invitation, None, "u-1"));
/// // Someone else calling an idle client: surfaced.
/// assert!(should_surface(&invitation, None, "u-2"));
/// ```
pub fn should_surface(
    invitation: &Invitation,
    current: Option<&CurrentCallSnapshot>,
    local_user_id: &str,
) -> bool {
    if let Some(current) = current {
        // The session already known locally, whoever initiated it.
        if current.signaling_call_id == Some(invitation.signaling_call_id) {
            return false;
        }
    }

    // Echo of the local user's own outgoing call.
    if invitation.caller.id == local_user_id {
        return false;
    }

    // Never show two incoming overlays; the first invitation wins.
    if let Some(current) = current {
        if current.state == CallState::Ringing {
            return false;
        }
    }

    true
}
