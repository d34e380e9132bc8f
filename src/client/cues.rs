//! Audio cues and notifications for call transitions
//!
//! Purely cosmetic side effects: a looping outgoing tone while `calling`,
//! a looping incoming tone (plus a best-effort OS notification) while
//! `ringing`, both stopped on any transition out of those states. Failures
//! here are swallowed; they must never affect state transitions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::call::{CallInfo, CallState};

/// The two looping tones the client plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Heard by the caller while waiting for an answer
    Outgoing,
    /// Heard by the callee while an invitation is ringing
    Incoming,
}

/// Host-supplied tone playback
///
/// `start_tone` is expected to loop until the matching `stop_tone`; calling
/// `stop_tone` for a tone that is not playing must be a no-op.
#[async_trait]
pub trait CuePlayer: Send + Sync {
    /// Start a looping tone
    async fn start_tone(&self, tone: Tone) -> anyhow::Result<()>;

    /// Stop a looping tone (no-op when not playing)
    async fn stop_tone(&self, tone: Tone) -> anyhow::Result<()>;
}

/// Host-supplied OS notification surface
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Best-effort "X is calling you" notification
    async fn notify_incoming_call(&self, caller_label: &str) -> anyhow::Result<()>;
}

/// [`CuePlayer`] that plays nothing; the default
#[derive(Debug, Default)]
pub struct NoopCuePlayer;

#[async_trait]
impl CuePlayer for NoopCuePlayer {
    async fn start_tone(&self, _tone: Tone) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop_tone(&self, _tone: Tone) -> anyhow::Result<()> {
        Ok(())
    }
}

/// [`AlertNotifier`] that notifies nothing; the default
#[derive(Debug, Default)]
pub struct NoopAlertNotifier;

#[async_trait]
impl AlertNotifier for NoopAlertNotifier {
    async fn notify_incoming_call(&self, _caller_label: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Maps call state transitions to cues and notifications
pub struct SideEffectManager {
    cues: Arc<dyn CuePlayer>,
    notifier: Arc<dyn AlertNotifier>,
}

impl SideEffectManager {
    /// Create a manager over the host's cue player and notifier
    pub fn new(cues: Arc<dyn CuePlayer>, notifier: Arc<dyn AlertNotifier>) -> Self {
        Self { cues, notifier }
    }

    /// React to one call state transition
    ///
    /// Never fails: every hook error is logged at debug level and dropped.
    pub async fn on_transition(
        &self,
        previous: Option<CallState>,
        new_state: CallState,
        info: &CallInfo,
    ) {
        // Stop first so a ringing -> calling style switch never overlaps tones.
        if previous == Some(CallState::Calling) && new_state != CallState::Calling {
            self.swallow("stop outgoing tone", self.cues.stop_tone(Tone::Outgoing).await);
        }
        if previous == Some(CallState::Ringing) && new_state != CallState::Ringing {
            self.swallow("stop incoming tone", self.cues.stop_tone(Tone::Incoming).await);
        }

        match new_state {
            CallState::Calling if previous != Some(CallState::Calling) => {
                self.swallow("start outgoing tone", self.cues.start_tone(Tone::Outgoing).await);
            }
            CallState::Ringing if previous != Some(CallState::Ringing) => {
                self.swallow("start incoming tone", self.cues.start_tone(Tone::Incoming).await);
                self.swallow(
                    "incoming notification",
                    self.notifier.notify_incoming_call(info.peer.label()).await,
                );
            }
            _ => {}
        }
    }

    /// Stop both tones unconditionally; used by stop and hard reset
    pub async fn silence(&self) {
        self.swallow("stop outgoing tone", self.cues.stop_tone(Tone::Outgoing).await);
        self.swallow("stop incoming tone", self.cues.stop_tone(Tone::Incoming).await);
    }

    fn swallow(&self, what: &str, result: anyhow::Result<()>) {
        if let Err(e) = result {
            debug!(side_effect = what, error = %e, "side effect failed (ignored)");
        }
    }
}
