//! Fluent builder for the call coordination client
//!
//! Assembles a [`ClientManager`] from the host-supplied collaborators: the
//! HTTP transport and the media engine are required, audio cues, OS
//! notifications and the persisted-flag store default to no-ops.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use livecall_client_core::{ClientBuilder, ClientConfig};
//! use std::sync::Arc;
//!
//! # fn example(
//! #     http: Arc<dyn livecall_client_core::signaling::http::HttpClient>,
//! #     engine: Arc<dyn livecall_client_core::media::MediaEngine>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("https://backend.example/api/calls/", "u-100")?;
//! let client = ClientBuilder::new(config)
//!     .http_client(http)
//!     .media_engine(engine)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{ClientError, ClientResult};
use crate::media::{CallFlagStore, DeviceSelection, InMemoryCallFlagStore, MediaEngine};
use crate::signaling::http::HttpClient;
use crate::signaling::SignalingClient;

use super::config::ClientConfig;
use super::cues::{AlertNotifier, CuePlayer, NoopAlertNotifier, NoopCuePlayer, SideEffectManager};
use super::handoff::MediaSessionHandoff;
use super::manager::ClientManager;

/// Builder for [`ClientManager`]
pub struct ClientBuilder {
    config: ClientConfig,
    http: Option<Arc<dyn HttpClient>>,
    engine: Option<Arc<dyn MediaEngine>>,
    cues: Arc<dyn CuePlayer>,
    notifier: Arc<dyn AlertNotifier>,
    flags: Arc<dyn CallFlagStore>,
}

impl ClientBuilder {
    /// Start building from a configuration
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: None,
            engine: None,
            cues: Arc::new(NoopCuePlayer),
            notifier: Arc::new(NoopAlertNotifier),
            flags: Arc::new(InMemoryCallFlagStore::new()),
        }
    }

    /// Supply the HTTP transport (required)
    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Supply the media engine (required)
    pub fn media_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Supply a tone player (defaults to silence)
    pub fn cue_player(mut self, cues: Arc<dyn CuePlayer>) -> Self {
        self.cues = cues;
        self
    }

    /// Supply an OS notification surface (defaults to none)
    pub fn alert_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Supply a persisted-flag store (defaults to in-memory)
    pub fn flag_store(mut self, flags: Arc<dyn CallFlagStore>) -> Self {
        self.flags = flags;
        self
    }

    /// Validate and assemble the manager
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidConfiguration`] when the configuration is
    /// incomplete or a required collaborator is missing.
    pub fn build(self) -> ClientResult<Arc<ClientManager>> {
        self.config.validate()?;

        let http = self.http.ok_or_else(|| ClientError::InvalidConfiguration {
            field: "http_client".to_string(),
            reason: "an HTTP transport is required".to_string(),
        })?;
        let engine = self.engine.ok_or_else(|| ClientError::InvalidConfiguration {
            field: "media_engine".to_string(),
            reason: "a media engine is required".to_string(),
        })?;

        let signaling = Arc::new(SignalingClient::new(
            http,
            self.config.base_url.clone(),
            self.config.bearer_token.clone(),
            self.config.signaling_timeout,
            self.config.user_agent.clone(),
        ));
        let devices = Arc::new(RwLock::new(DeviceSelection::default()));
        let handoff = MediaSessionHandoff::new(
            engine,
            self.flags.clone(),
            signaling.clone(),
            devices.clone(),
        );
        let side_effects = SideEffectManager::new(self.cues, self.notifier);

        Ok(ClientManager::from_parts(
            self.config,
            signaling,
            handoff,
            side_effects,
            self.flags,
            devices,
        ))
    }
}
