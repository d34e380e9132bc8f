//! Signaling client for the call backend
//!
//! This module owns the request/response half of call coordination: the
//! typed operations (`start`, `answer`, `cancel`, `poll_incoming`,
//! `poll_status`, plus the best-effort `end` and advisory `check_balance`)
//! against the HTTP/JSON backend.
//!
//! Every operation is bounded by the configured timeout and carries an
//! explicit cancellation handle. Issuing a new request of the same kind
//! aborts the previous in-flight request of that kind first, so loops that
//! fire the same operation repeatedly can never pile up sockets.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────┐
//! │  Coordination loops     │  poller / status loop / user actions
//! └───────────┬─────────────┘
//!             │ typed operations
//! ┌───────────▼─────────────┐
//! │    SignalingClient      │ ◄── This Module
//! │  auth / timeout / abort │
//! │  status → error mapping │
//! └───────────┬─────────────┘
//!             │ HttpRequest / HttpResponse
//! ┌───────────▼─────────────┐
//! │  dyn HttpClient (host)  │
//! └─────────────────────────┘
//! ```

pub mod http;
pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::{AbortHandle, Abortable};
use url::Url;

use crate::call::{PeerInfo, RoomId};
use crate::error::{ClientError, ClientResult};

use http::{HttpClient, HttpRequest, HttpResponse};
use types::*;

/// Kinds of signaling requests, used to key per-kind cancellation handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// `POST start`
    Start,
    /// `POST answer`
    Answer,
    /// `POST cancel`
    Cancel,
    /// `POST end`
    End,
    /// `GET check-incoming`
    PollIncoming,
    /// `POST status`
    PollStatus,
    /// `GET balance`
    Balance,
}

impl RequestKind {
    fn path(&self) -> &'static str {
        match self {
            RequestKind::Start => "start",
            RequestKind::Answer => "answer",
            RequestKind::Cancel => "cancel",
            RequestKind::End => "end",
            RequestKind::PollIncoming => "check-incoming",
            RequestKind::PollStatus => "status",
            RequestKind::Balance => "balance",
        }
    }
}

/// Successful outcome of [`SignalingClient::start`]
#[derive(Debug, Clone, PartialEq)]
pub struct StartedCall {
    /// Backend call id
    pub call_id: u64,
    /// Media room handle for the eventual join
    pub room: RoomId,
}

/// Successful outcome of [`SignalingClient::answer`]
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    /// Media room handle, present when accepting
    pub room: Option<RoomId>,
    /// The caller's identity, echoed back by the backend
    pub caller: Option<PeerInfo>,
}

/// Result of one [`SignalingClient::poll_incoming`] round
#[derive(Debug, Clone)]
pub struct IncomingPoll {
    /// Whether the backend reports someone calling the local user
    pub has_incoming: bool,
    /// The invitation, when `has_incoming` is true
    pub invitation: Option<Invitation>,
}

/// Typed client for the signaling backend
///
/// Stateless beyond the bearer credential and the per-kind cancellation
/// handles; every method is one bounded request.
pub struct SignalingClient {
    http: Arc<dyn HttpClient>,
    base_url: Url,
    bearer_token: std::sync::RwLock<Option<String>>,
    user_agent: String,
    timeout: Duration,
    in_flight: DashMap<RequestKind, (u64, AbortHandle)>,
    next_seq: AtomicU64,
}

impl SignalingClient {
    /// Create a client against `base_url` using the supplied transport
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: Url,
        bearer_token: Option<String>,
        timeout: Duration,
        user_agent: String,
    ) -> Self {
        Self {
            http,
            base_url,
            bearer_token: std::sync::RwLock::new(bearer_token),
            user_agent,
            timeout,
            in_flight: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Replace (or clear) the bearer credential
    pub fn set_bearer_token(&self, token: Option<String>) {
        *self.bearer_token.write().expect("token lock poisoned") = token;
    }

    /// Abort every in-flight request; used by client stop and hard reset
    pub fn cancel_all(&self) {
        for entry in self.in_flight.iter() {
            entry.value().1.abort();
        }
        self.in_flight.clear();
    }

    /// Abort the in-flight request of one kind, if any
    pub fn cancel_kind(&self, kind: RequestKind) {
        if let Some((_, (_, handle))) = self.in_flight.remove(&kind) {
            handle.abort();
        }
    }

    /// Start an outgoing call to `receiver_id`
    pub async fn start(&self, receiver_id: &str, call_type: CallKind) -> ClientResult<StartedCall> {
        let body = serde_json::to_value(StartRequest {
            receiver_id: receiver_id.to_string(),
            call_type,
        })
        .map_err(|e| ClientError::InternalError { message: e.to_string() })?;

        let value = self.execute(RequestKind::Start, Some(body)).await?;
        let parsed: StartResponse = parse_body(value)?;

        if !parsed.success {
            return Err(match parsed.error_code.as_deref() {
                Some("insufficient_balance") => ClientError::InsufficientBalance,
                _ => ClientError::CallSetupFailed {
                    reason: parsed
                        .message
                        .unwrap_or_else(|| "backend refused the call".to_string()),
                },
            });
        }

        match (parsed.call_id, parsed.room_name) {
            (Some(call_id), Some(room)) => Ok(StartedCall { call_id, room: RoomId(room) }),
            _ => Err(ClientError::ProtocolError {
                reason: "start response missing call_id or room_name".to_string(),
            }),
        }
    }

    /// Answer (accept or reject) an invitation
    pub async fn answer(&self, call_id: u64, action: AnswerAction) -> ClientResult<AnswerOutcome> {
        let body = serde_json::to_value(AnswerRequest { call_id, action })
            .map_err(|e| ClientError::InternalError { message: e.to_string() })?;

        let value = self.execute(RequestKind::Answer, Some(body)).await?;
        let parsed: AnswerResponse = parse_body(value)?;

        if !parsed.success {
            return Err(ClientError::CallSetupFailed {
                reason: format!("backend refused to {action:?} call {call_id}").to_lowercase(),
            });
        }

        Ok(AnswerOutcome {
            room: parsed.room_name.map(RoomId),
            caller: parsed.caller.map(PeerInfo::from),
        })
    }

    /// Cancel an outgoing call (fire-and-forget semantics at the call site)
    pub async fn cancel(&self, call_id: u64) -> ClientResult<()> {
        let body = serde_json::to_value(CallRef { call_id })
            .map_err(|e| ClientError::InternalError { message: e.to_string() })?;
        let value = self.execute(RequestKind::Cancel, Some(body)).await?;
        let parsed: AckResponse = parse_body(value)?;
        if !parsed.success {
            tracing::debug!(call_id, "backend did not acknowledge cancel");
        }
        Ok(())
    }

    /// Mark a room as ended on the backend (teardown step, best-effort)
    pub async fn end(&self, call_id: u64) -> ClientResult<()> {
        let body = serde_json::to_value(CallRef { call_id })
            .map_err(|e| ClientError::InternalError { message: e.to_string() })?;
        let value = self.execute(RequestKind::End, Some(body)).await?;
        let parsed: AckResponse = parse_body(value)?;
        if !parsed.success {
            tracing::debug!(call_id, "backend did not acknowledge end");
        }
        Ok(())
    }

    /// Ask the backend whether someone is calling the local user
    pub async fn poll_incoming(&self) -> ClientResult<IncomingPoll> {
        let value = self.execute(RequestKind::PollIncoming, None).await?;
        let parsed: CheckIncomingResponse = parse_body(value)?;
        Ok(IncomingPoll {
            has_incoming: parsed.has_incoming,
            invitation: parsed.incoming_call.map(Invitation::from),
        })
    }

    /// Fetch the remote status of an outgoing call
    ///
    /// An unknown or absent status is reported as
    /// [`RemoteCallStatus::Pending`] per the backend contract.
    pub async fn poll_status(&self, call_id: u64) -> ClientResult<RemoteCallStatus> {
        let body = serde_json::to_value(CallRef { call_id })
            .map_err(|e| ClientError::InternalError { message: e.to_string() })?;
        let value = self.execute(RequestKind::PollStatus, Some(body)).await?;
        let parsed: StatusResponse = parse_body(value)?;
        Ok(parsed
            .call
            .map(|c| RemoteCallStatus::from(c.status))
            .unwrap_or(RemoteCallStatus::Pending))
    }

    /// Advisory caller-side balance check
    ///
    /// Callers treat any failure as "unknown" and proceed; only the
    /// authoritative refusal from [`SignalingClient::start`] blocks a call.
    pub async fn check_balance(&self) -> ClientResult<Option<u64>> {
        let value = self.execute(RequestKind::Balance, None).await?;
        let parsed: BalanceResponse = parse_body(value)?;
        Ok(parsed.balance)
    }

    /// Issue one request: auth headers, timeout, cancellation, status mapping
    async fn execute(
        &self,
        kind: RequestKind,
        body: Option<serde_json::Value>,
    ) -> ClientResult<serde_json::Value> {
        let url = self
            .base_url
            .join(kind.path())
            .map_err(|e| ClientError::InvalidConfiguration {
                field: "base_url".to_string(),
                reason: e.to_string(),
            })?;

        let mut request = match body {
            Some(value) => {
                let bytes = serde_json::to_vec(&value)
                    .map_err(|e| ClientError::InternalError { message: e.to_string() })?;
                HttpRequest::post(url.as_str())
                    .with_header("Content-Type", "application/json")
                    .with_body(bytes)
            }
            None => HttpRequest::get(url.as_str()),
        };
        request = request
            .with_header("Accept", "application/json")
            .with_header("User-Agent", self.user_agent.clone());
        if let Some(token) = self.bearer_token.read().expect("token lock poisoned").as_deref() {
            request = request.with_header("Authorization", format!("Bearer {token}"));
        }

        // A newer request of the same kind wins; abort the older one.
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        if let Some((_, previous)) = self.in_flight.insert(kind, (seq, abort_handle.clone())) {
            previous.abort();
        }

        let outcome = tokio::time::timeout(
            self.timeout,
            Abortable::new(self.http.execute(request), abort_registration),
        )
        .await;

        self.in_flight.remove_if(&kind, |_, value| value.0 == seq);

        let response = match outcome {
            Err(_elapsed) => {
                abort_handle.abort();
                return Err(ClientError::ConnectionTimeout);
            }
            Ok(Err(_aborted)) => return Err(ClientError::OperationCancelled),
            Ok(Ok(Err(transport))) => {
                return Err(ClientError::NetworkError { reason: transport.to_string() })
            }
            Ok(Ok(Ok(response))) => response,
        };

        self.interpret(kind, response)
    }

    fn interpret(&self, kind: RequestKind, response: HttpResponse) -> ClientResult<serde_json::Value> {
        let status = response.status_code;
        if response.is_success() {
            if response.body.is_empty() {
                return Ok(serde_json::Value::Null);
            }
            return serde_json::from_slice(&response.body).map_err(|e| {
                ClientError::ProtocolError { reason: format!("invalid JSON body: {e}") }
            });
        }

        match status {
            401 | 403 => {
                let error: ErrorBody =
                    serde_json::from_slice(&response.body).unwrap_or_default();
                let reason = error
                    .message
                    .or(error.error_code.clone())
                    .unwrap_or_else(|| format!("HTTP {status}"));
                if error.error_code.as_deref() == Some("session_suspended") {
                    Err(ClientError::SessionSuspended { reason })
                } else {
                    Err(ClientError::AuthenticationRequired { reason })
                }
            }
            402 => Err(ClientError::InsufficientBalance),
            500..=599 => Err(ClientError::NetworkError {
                reason: format!("server error HTTP {status} on {}", kind.path()),
            }),
            _ => Err(ClientError::ProtocolError {
                reason: format!("unexpected HTTP {status} on {}", kind.path()),
            }),
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> ClientResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::ProtocolError { reason: format!("unexpected body shape: {e}") })
}
