//! Incoming-call polling loop
//!
//! The backend pushes nothing: the only way to learn about an incoming call
//! is to ask. This module owns the repeating `check-incoming` timer and the
//! discipline around it:
//!
//! - **single-flight**: a new poll never starts while one is outstanding;
//! - **throttling**: polls are never closer together than the configured
//!   throttle window, whatever the timer does;
//! - **backoff**: consecutive failures stretch the effective interval to
//!   `base * min(1 + 0.5 * errors, cap)`, recomputed each time the timer is
//!   re-armed, never mid-flight;
//! - **eligibility**: polling is suspended entirely while the client is in
//!   a media session or outside the normal application mode. Eligibility is
//!   re-read from the manager on every tick, never captured at spawn.
//!
//! Successful poll results flow through echo suppression before they can
//! touch call state. A suspended-session error triggers a hard client
//! reset; a plain authentication failure stops polling and surfaces a
//! login demand.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::signaling::IncomingPoll;

use super::manager::ClientManager;

/// Effective backoff multiplier for a number of consecutive errors
///
/// Non-decreasing in `errors` and bounded by `cap`.
pub(crate) fn backoff_factor(errors: u32, cap: f64) -> f64 {
    (1.0 + 0.5 * errors as f64).min(cap)
}

/// Mutable state of the poll cycle
///
/// Owned exclusively by the poller task; never shared outside it.
#[derive(Debug)]
pub(crate) struct PollCycleState {
    /// True for the entire duration of exactly one outstanding request
    in_flight: bool,
    /// When the last poll was issued
    last_check_at: Option<Instant>,
    /// Failures since the last success
    consecutive_errors: u32,
}

impl PollCycleState {
    pub(crate) fn new() -> Self {
        Self { in_flight: false, last_check_at: None, consecutive_errors: 0 }
    }

    /// Whether a new poll may be issued right now
    pub(crate) fn may_poll(&self, now: Instant, throttle: Duration) -> bool {
        if self.in_flight {
            return false;
        }
        match self.last_check_at {
            Some(last) => now.duration_since(last) >= throttle,
            None => true,
        }
    }

    /// Mark a poll as issued
    pub(crate) fn begin(&mut self, now: Instant) {
        self.in_flight = true;
        self.last_check_at = Some(now);
    }

    /// Mark the outstanding poll as finished (success or failure)
    pub(crate) fn finish(&mut self) {
        self.in_flight = false;
    }

    pub(crate) fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    pub(crate) fn record_error(&mut self) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
    }

    pub(crate) fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }
}

/// The incoming-call poll task
pub(crate) struct IncomingCallPoller;

impl IncomingCallPoller {
    /// Spawn the poll loop for `manager`
    ///
    /// The task holds only a weak reference and exits when the manager is
    /// dropped; the manager arms and disarms it on eligibility changes.
    pub(crate) fn spawn(manager: &Arc<ClientManager>) -> JoinHandle<()> {
        let weak = Arc::downgrade(manager);
        tokio::spawn(async move {
            let mut cycle = PollCycleState::new();
            loop {
                // Re-arm the timer with the backoff-adjusted interval.
                let interval = match weak.upgrade() {
                    Some(manager) => manager
                        .config
                        .poll_interval
                        .mul_f64(backoff_factor(
                            cycle.consecutive_errors(),
                            manager.config.poll_backoff_cap,
                        )),
                    None => return,
                };
                tokio::time::sleep(interval).await;

                let Some(manager) = weak.upgrade() else { return };

                // Step 1: eligibility, re-read on every tick.
                if !manager.poll_eligible().await {
                    continue;
                }
                // Steps 2 and 3: single-flight and throttle.
                let now = Instant::now();
                if !cycle.may_poll(now, manager.config.poll_throttle) {
                    continue;
                }

                // Step 4: issue the poll. The signaling client aborts any
                // still-pending request of the same kind first.
                cycle.begin(now);
                let outcome = manager.signaling.poll_incoming().await;
                cycle.finish();

                match outcome {
                    Ok(poll) => {
                        cycle.record_success();
                        manager.handle_poll_result(poll).await;
                    }
                    Err(ClientError::OperationCancelled) => {
                        // Deliberate cancellation; not an error.
                    }
                    Err(ClientError::SessionSuspended { reason }) => {
                        warn!(reason = %reason, "session suspended, forcing hard reset");
                        let manager = manager.clone();
                        // Reset on a fresh task: the reset disarms this one.
                        tokio::spawn(async move {
                            manager.hard_reset("session suspended").await;
                        });
                        return;
                    }
                    Err(ClientError::AuthenticationRequired { reason }) => {
                        warn!(reason = %reason, "authentication required, polling stopped");
                        manager.auth_required(reason).await;
                        return;
                    }
                    Err(e) => {
                        cycle.record_error();
                        debug!(
                            error = %e,
                            category = e.category(),
                            consecutive_errors = cycle.consecutive_errors(),
                            "incoming poll failed"
                        );
                    }
                }
            }
        })
    }
}

impl ClientManager {
    /// Consume one poll result: echo suppression, stale-ringing cleanup,
    /// invitation surfacing.
    pub(crate) async fn handle_poll_result(self: &Arc<Self>, poll: IncomingPoll) {
        let invitation = match poll.invitation {
            Some(invitation) if poll.has_incoming => invitation,
            _ => {
                // Nothing incoming any more: the caller gave up on whatever
                // was ringing or pending.
                self.clear_pending_invitation().await;
                self.clear_stale_ringing().await;
                return;
            }
        };

        self.receive_invitation(invitation).await;
    }
}
