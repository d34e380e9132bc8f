//! Configuration for the call coordination client
//!
//! All timing knobs of the control loops live here with the defaults the
//! backend contract suggests: 8s request deadline, 5s incoming-poll cadence
//! with a 3s throttle window and a 3x backoff cap, 2s outgoing status-poll
//! cadence.
//!
//! # Usage Examples
//!
//! ```rust
//! use livecall_client_core::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("https://backend.example/api/calls/", "u-100")
//!     .expect("valid base url")
//!     .with_bearer_token("secret-token")
//!     .with_poll_interval(Duration::from_secs(5));
//!
//! assert_eq!(config.local_user_id, "u-100");
//! assert_eq!(config.poll_interval, Duration::from_secs(5));
//! ```

use std::time::Duration;

use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::signaling::types::CallKind;

/// Configuration for a [`crate::client::ClientManager`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the signaling backend; endpoint paths are joined onto it
    pub base_url: Url,

    /// Bearer credential for the backend, if already authenticated
    pub bearer_token: Option<String>,

    /// Backend id of the local user
    ///
    /// Used by echo suppression to recognize the local user's own outgoing
    /// calls in poll results.
    pub local_user_id: String,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Kind of call this client starts by default
    pub call_type: CallKind,

    /// Deadline for every signaling request
    pub signaling_timeout: Duration,

    /// Base cadence of the incoming-call poll loop
    pub poll_interval: Duration,

    /// Minimum spacing between two incoming polls
    ///
    /// Guards against timer drift causing back-to-back requests.
    pub poll_throttle: Duration,

    /// Cap on the backoff multiplier of the poll loops (3.0 = three times
    /// the base interval)
    pub poll_backoff_cap: f64,

    /// Cadence of the outgoing-call status poll loop
    pub status_poll_interval: Duration,

    /// Terminal call records retained as history before pruning
    pub max_call_history: usize,
}

impl ClientConfig {
    /// Create a configuration with default timings
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfiguration`] when `base_url` does
    /// not parse as an absolute URL.
    pub fn new(base_url: &str, local_user_id: impl Into<String>) -> ClientResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidConfiguration {
            field: "base_url".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            base_url,
            bearer_token: None,
            local_user_id: local_user_id.into(),
            user_agent: format!("livecall-client-core/{}", env!("CARGO_PKG_VERSION")),
            call_type: CallKind::Video,
            signaling_timeout: Duration::from_secs(8),
            poll_interval: Duration::from_secs(5),
            poll_throttle: Duration::from_secs(3),
            poll_backoff_cap: 3.0,
            status_poll_interval: Duration::from_secs(2),
            max_call_history: 50,
        })
    }

    /// Set the bearer credential
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the default call kind
    pub fn with_call_type(mut self, call_type: CallKind) -> Self {
        self.call_type = call_type;
        self
    }

    /// Set the signaling request deadline
    pub fn with_signaling_timeout(mut self, timeout: Duration) -> Self {
        self.signaling_timeout = timeout;
        self
    }

    /// Set the incoming-poll base cadence
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the incoming-poll throttle window
    pub fn with_poll_throttle(mut self, throttle: Duration) -> Self {
        self.poll_throttle = throttle;
        self
    }

    /// Set the outgoing status-poll cadence
    pub fn with_status_poll_interval(mut self, interval: Duration) -> Self {
        self.status_poll_interval = interval;
        self
    }

    /// Validate fields that only the manager can reject
    pub(crate) fn validate(&self) -> ClientResult<()> {
        if self.local_user_id.is_empty() {
            return Err(ClientError::InvalidConfiguration {
                field: "local_user_id".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.poll_backoff_cap < 1.0 {
            return Err(ClientError::InvalidConfiguration {
                field: "poll_backoff_cap".to_string(),
                reason: "must be at least 1.0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_contract() {
        let config = ClientConfig::new("https://backend.test/api/", "u-1").unwrap();
        assert_eq!(config.signaling_timeout, Duration::from_secs(8));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.poll_throttle, Duration::from_secs(3));
        assert_eq!(config.status_poll_interval, Duration::from_secs(2));
        assert_eq!(config.poll_backoff_cap, 3.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            ClientConfig::new("not a url", "u-1"),
            Err(ClientError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn rejects_empty_user_id() {
        let config = ClientConfig::new("https://backend.test/api/", "").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ClientError::InvalidConfiguration { .. })
        ));
    }
}
