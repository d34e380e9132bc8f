//! Error types for the client-core library
//!
//! This module defines the error taxonomy used across the call coordination
//! layer. Errors are grouped along the lines the control loops care about:
//! transient transport failures feed backoff counters, authentication
//! failures stop polling, a suspended session forces a hard client reset,
//! and deliberate cancellations are expected and never retried.
//!
//! # Error Categories
//!
//! - **Network** - transport failures and timeouts (recoverable, retried)
//! - **Auth** - missing/invalid credentials and suspended sessions
//! - **Call** - call lifecycle errors (not found, wrong state, setup failed)
//! - **Media** - media engine connect/publish failures
//! - **Protocol** - malformed or unexpected backend responses
//! - **Cancelled** - deliberately aborted requests (expected, not retried)
//!
//! # Usage Examples
//!
//! ```rust
//! use livecall_client_core::{ClientError, ClientResult};
//!
//! fn check(result: ClientResult<()>) {
//!     match result {
//!         Ok(()) => println!("ok"),
//!         Err(e) if e.is_recoverable() => println!("transient: {}", e),
//!         Err(e) => println!("fatal ({}): {}", e.category(), e),
//!     }
//! }
//!
//! let err = ClientError::NetworkError { reason: "connection reset".to_string() };
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "network");
//! ```

use thiserror::Error;

/// Result type used throughout the client-core library
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur during call coordination operations
///
/// The variants mirror the failure modes of the signaling backend and the
/// media engine. `is_recoverable()` decides whether the owning loop retries
/// the operation; `category()` is attached to structured log records.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// Network transport failure (connection refused/reset, DNS, 5xx)
    #[error("Network error: {reason}")]
    NetworkError {
        /// What went wrong at the transport level
        reason: String,
    },

    /// A request exceeded its configured deadline
    #[error("Request timed out")]
    ConnectionTimeout,

    /// The backend rejected the credential (HTTP 401/403)
    ///
    /// Polling loops stop and the host application must re-authenticate.
    #[error("Authentication required: {reason}")]
    AuthenticationRequired {
        /// Backend-provided detail, if any
        reason: String,
    },

    /// The backend reported the session as suspended
    ///
    /// This is stronger than [`ClientError::AuthenticationRequired`]: the
    /// client must clear all local and persisted state immediately and must
    /// not retry with the same credential.
    #[error("Session suspended: {reason}")]
    SessionSuspended {
        /// Backend-provided suspension detail
        reason: String,
    },

    /// The backend refused to start the call for lack of balance
    #[error("Insufficient balance to start the call")]
    InsufficientBalance,

    /// The request was deliberately cancelled by a newer request or teardown
    ///
    /// Expected during normal operation; never retried and never counted
    /// against backoff.
    #[error("Operation cancelled")]
    OperationCancelled,

    /// No call exists with the given identifier
    #[error("Call not found: {call_id}")]
    CallNotFound {
        /// The call that was looked up
        call_id: crate::call::CallId,
    },

    /// The call exists but is not in a state that permits the operation
    #[error("Invalid call state for call {call_id}: {state}")]
    InvalidCallState {
        /// The call the operation targeted
        call_id: crate::call::CallId,
        /// The state the call was actually in
        state: crate::call::CallState,
    },

    /// Starting an outgoing call failed
    #[error("Call setup failed: {reason}")]
    CallSetupFailed {
        /// Why the setup failed
        reason: String,
    },

    /// Terminating a call failed
    #[error("Call termination failed: {reason}")]
    CallTerminated {
        /// Why the termination failed
        reason: String,
    },

    /// The media engine failed to connect or publish
    #[error("Media session error: {reason}")]
    MediaSessionFailed {
        /// Engine-provided failure detail
        reason: String,
    },

    /// The backend response could not be interpreted
    #[error("Protocol error: {reason}")]
    ProtocolError {
        /// What was malformed or unexpected
        reason: String,
    },

    /// An internal invariant was violated
    ///
    /// Must be impossible by construction; when detected the current
    /// operation is aborted and the client performs a full reset.
    #[error("Invariant violation: {message}")]
    InvariantViolation {
        /// Which invariant broke
        message: String,
    },

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration {
        /// The offending configuration field
        field: String,
        /// Why it is invalid
        reason: String,
    },

    /// Unexpected internal error
    #[error("Internal error: {message}")]
    InternalError {
        /// Description of the failure
        message: String,
    },
}

impl ClientError {
    /// Whether the owning loop should retry the failed operation
    ///
    /// Only genuinely transient failures are recoverable. Cancellations are
    /// expected and not retried; auth and state errors require intervention.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use livecall_client_core::ClientError;
    ///
    /// assert!(ClientError::ConnectionTimeout.is_recoverable());
    /// assert!(!ClientError::InsufficientBalance.is_recoverable());
    /// assert!(!ClientError::OperationCancelled.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::NetworkError { .. } | ClientError::ConnectionTimeout
        )
    }

    /// Coarse error category, attached to structured log records
    ///
    /// # Examples
    ///
    /// ```rust
    /// use livecall_client_core::ClientError;
    ///
    /// let err = ClientError::SessionSuspended { reason: "banned".to_string() };
    /// assert_eq!(err.category(), "auth");
    /// ```
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::NetworkError { .. } | ClientError::ConnectionTimeout => "network",
            ClientError::AuthenticationRequired { .. }
            | ClientError::SessionSuspended { .. } => "auth",
            ClientError::InsufficientBalance
            | ClientError::CallNotFound { .. }
            | ClientError::InvalidCallState { .. }
            | ClientError::CallSetupFailed { .. }
            | ClientError::CallTerminated { .. } => "call",
            ClientError::MediaSessionFailed { .. } => "media",
            ClientError::ProtocolError { .. } => "protocol",
            ClientError::OperationCancelled => "cancelled",
            ClientError::InvariantViolation { .. } => "invariant",
            ClientError::InvalidConfiguration { .. } => "config",
            ClientError::InternalError { .. } => "internal",
        }
    }

    /// Whether this error must trigger a hard client reset
    pub fn requires_hard_reset(&self) -> bool {
        matches!(
            self,
            ClientError::SessionSuspended { .. } | ClientError::InvariantViolation { .. }
        )
    }
}
