//! # livecall-client-core
//!
//! Call session coordination layer for the LiveCall signaling backend.
//!
//! This crate implements the client-side control logic of a two-party
//! calling system: one side requests a call, the other is notified by
//! polling, accepts or declines, and both sides are handed off into a
//! shared media session. The crate decides *when* to call which backend
//! endpoint, *how* to interpret the responses, and *how* to transition
//! safely between call and media-session states - it does not transport
//! media bytes, render UI, or persist chat history.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Host Application                     │
//! │   (UI overlays, device picker, HTTP stack, media engine) │
//! └───────┬───────────────────────────────────▲──────────────┘
//!         │ operations                        │ events
//! ┌───────▼───────────────────────────────────┴──────────────┐
//! │                      ClientManager                       │
//! │                                                          │
//! │  IncomingCallPoller ─► EchoSuppressor ─► call state ─┐   │
//! │        ▲                                             │   │
//! │        │ check-incoming                              ▼   │
//! │  SignalingClient ◄── status-poll loop      MediaHandoff  │
//! │        │                                   SideEffects   │
//! └────────┼─────────────────────────────────────┬───────────┘
//!          ▼                                     ▼
//!   HTTP/JSON backend                  media-session library
//! ```
//!
//! The backend pushes nothing: both the incoming-call check and the
//! outgoing-call status are pure polling loops, each with its own
//! single-flight guard and backoff. Switching media sessions always runs
//! the full teardown of the old session before the new join begins, and
//! device preferences survive the swap.
//!
//! # Quickstart
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
//!     .with_bearer_token("secret-token");
//!
//! let client = ClientBuilder::new(config)
//!     .http_client(http)
//!     .media_engine(engine)
//!     .build()?;
//!
//! // Polling for incoming calls starts here.
//! client.start().await?;
//!
//! // Place a call; the status-poll loop drives it to active.
//! let call_id = client.start_call("u-200").await?;
//! println!("calling, local id {call_id}");
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod client;
pub mod error;
pub mod events;
pub mod media;
pub mod signaling;

pub use call::{CallDirection, CallId, CallInfo, CallState, PeerInfo, RoomId};
pub use client::{ClientBuilder, ClientConfig, ClientManager, ClientMode, ClientStats};
pub use error::{ClientError, ClientResult};
pub use events::{
    CallAction, CallStatusInfo, ClientEvent, ClientEventHandler, EventPriority, IncomingCallInfo,
};
pub use media::{
    CallFlagStore, DeviceSelection, InMemoryCallFlagStore, MediaEngine, MediaSession, TrackKind,
};
pub use signaling::types::{CallKind, Invitation};
pub use signaling::SignalingClient;
