// Tests module

//! Module-level test suite for the coordination layer
//!
//! Exercises the manager surface against null collaborators: builder
//! validation, operation preconditions, state bookkeeping and eligibility.
//! The full polling / hand-off scenarios live in the `tests/` directory
//! with scripted fakes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_test::assert_ok;

use crate::call::CallState;
use crate::client::{ClientBuilder, ClientConfig, ClientManager, ClientMode};
use crate::error::ClientError;
use crate::media::{DeviceSelection, MediaEngine, MediaSession, TrackKind};
use crate::signaling::http::{HttpClient, HttpRequest, HttpResponse};

/// Transport that answers every endpoint with a benign default
struct NullHttp;

#[async_trait]
impl HttpClient for NullHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let body = if request.url.ends_with("check-incoming") {
            r#"{"has_incoming":false}"#
        } else if request.url.ends_with("status") {
            r#"{"call":{"status":"calling"}}"#
        } else if request.url.ends_with("start") {
            r#"{"success":true,"call_id":1,"room_name":"room-1"}"#
        } else if request.url.ends_with("answer") {
            r#"{"success":true,"room_name":"room-1","caller":{"id":"u-9","name":"Noa"}}"#
        } else if request.url.ends_with("balance") {
            r#"{"balance":50}"#
        } else {
            r#"{"success":true}"#
        };
        Ok(HttpResponse::new(200, body.as_bytes().to_vec()))
    }
}

/// Engine whose sessions publish both tracks and see no remote peers
struct NullEngine;

struct NullSession {
    room: crate::call::RoomId,
}

#[async_trait]
impl MediaSession for NullSession {
    fn room(&self) -> &crate::call::RoomId {
        &self.room
    }

    fn published_tracks(&self) -> Vec<TrackKind> {
        vec![TrackKind::Camera, TrackKind::Microphone]
    }

    async fn publish_track(&self, _kind: TrackKind, _device_id: Option<&str>) -> crate::ClientResult<()> {
        Ok(())
    }

    async fn unpublish_track(&self, _kind: TrackKind) -> crate::ClientResult<()> {
        Ok(())
    }

    async fn disconnect(&self) {}

    fn current_devices(&self) -> DeviceSelection {
        DeviceSelection::default()
    }

    fn remote_participant_count(&self) -> usize {
        1
    }
}

#[async_trait]
impl MediaEngine for NullEngine {
    async fn connect(
        &self,
        room: &crate::call::RoomId,
        _devices: &DeviceSelection,
    ) -> crate::ClientResult<Box<dyn MediaSession>> {
        Ok(Box::new(NullSession { room: room.clone() }))
    }
}

fn test_config() -> ClientConfig {
    ClientConfig::new("https://backend.test/api/calls/", "u-local")
        .unwrap()
        .with_bearer_token("token")
        .with_poll_interval(Duration::from_millis(25))
        .with_poll_throttle(Duration::from_millis(5))
        .with_status_poll_interval(Duration::from_millis(20))
}

fn test_client() -> Arc<ClientManager> {
    ClientBuilder::new(test_config())
        .http_client(Arc::new(NullHttp))
        .media_engine(Arc::new(NullEngine))
        .build()
        .expect("client builds")
}

#[tokio::test]
async fn builder_requires_transport_and_engine() {
    let missing_http = ClientBuilder::new(test_config())
        .media_engine(Arc::new(NullEngine))
        .build();
    assert!(matches!(
        missing_http.unwrap_err(),
        ClientError::InvalidConfiguration { field, .. } if field == "http_client"
    ));

    let missing_engine = ClientBuilder::new(test_config())
        .http_client(Arc::new(NullHttp))
        .build();
    assert!(matches!(
        missing_engine.unwrap_err(),
        ClientError::InvalidConfiguration { field, .. } if field == "media_engine"
    ));
}

#[tokio::test]
async fn start_call_requires_running_client() {
    let client = test_client();
    let result = client.start_call("u-2").await;
    assert!(matches!(result.unwrap_err(), ClientError::InternalError { .. }));
}

#[tokio::test]
async fn answer_without_invitation_fails() {
    let client = test_client();
    client.start().await.unwrap();
    let result = client.answer_call(true).await;
    assert!(matches!(result.unwrap_err(), ClientError::InternalError { .. }));
    client.stop().await;
}

#[tokio::test]
async fn cancel_and_hangup_are_idempotent_when_idle() {
    let client = test_client();
    client.start().await.unwrap();
    tokio_test::assert_ok!(client.cancel_call().await);
    tokio_test::assert_ok!(client.hangup_call().await);
    client.stop().await;
}

#[tokio::test]
async fn outgoing_call_reaches_calling() {
    let client = test_client();
    client.start().await.unwrap();

    let call_id = client.start_call("u-2").await.unwrap();
    let info = client.get_call(&call_id).await.unwrap();
    assert_eq!(info.state, CallState::Calling);
    assert_eq!(info.signaling_call_id, Some(1));
    assert_eq!(info.room.as_ref().map(|r| r.as_str()), Some("room-1"));

    let stats = client.get_client_stats().await;
    assert!(stats.is_running);
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.current_call, Some(call_id));

    client.cancel_call().await.unwrap();
    let info = client.get_call(&call_id).await.unwrap();
    assert_eq!(info.state, CallState::Cancelled);
    assert_eq!(client.get_client_stats().await.current_call, None);

    client.stop().await;
}

#[tokio::test]
async fn starting_a_second_call_winds_down_the_first() {
    let client = test_client();
    client.start().await.unwrap();

    let first = client.start_call("u-2").await.unwrap();
    let second = client.start_call("u-3").await.unwrap();
    assert_ne!(first, second);

    let first_info = client.get_call(&first).await.unwrap();
    assert_eq!(first_info.state, CallState::Cancelled);

    let second_info = client.get_call(&second).await.unwrap();
    assert_eq!(second_info.state, CallState::Calling);
    assert_eq!(client.get_client_stats().await.current_call, Some(second));

    client.stop().await;
}

#[tokio::test]
async fn mode_controls_poll_eligibility() {
    let client = test_client();
    client.start().await.unwrap();
    assert!(client.poll_eligible().await);

    client.set_mode(ClientMode::Authenticating).await;
    assert!(!client.poll_eligible().await);

    client.set_mode(ClientMode::Normal).await;
    assert!(client.poll_eligible().await);

    client.stop().await;
    assert!(!client.poll_eligible().await);
}

#[tokio::test]
async fn device_selection_round_trips() {
    let client = test_client();
    let devices = DeviceSelection {
        camera_id: Some("cam-front".into()),
        microphone_id: Some("mic-usb".into()),
    };
    client.set_device_selection(devices.clone()).await;
    assert_eq!(client.device_selection().await, devices);
}

#[tokio::test]
async fn get_call_reports_unknown_ids() {
    let client = test_client();
    let unknown = uuid::Uuid::new_v4();
    assert!(matches!(
        client.get_call(&unknown).await.unwrap_err(),
        ClientError::CallNotFound { call_id } if call_id == unknown
    ));
}

#[tokio::test]
async fn history_lists_terminal_calls_only() {
    let client = test_client();
    client.start().await.unwrap();

    let first = client.start_call("u-2").await.unwrap();
    client.cancel_call().await.unwrap();
    let second = client.start_call("u-3").await.unwrap();

    let history = client.get_call_history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].call_id, first);

    let all = client.list_calls().await;
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|c| c.call_id == second));

    client.stop().await;
}

#[tokio::test]
async fn hard_reset_clears_everything() {
    let client = test_client();
    client.start().await.unwrap();
    let _ = client.start_call("u-2").await.unwrap();

    client.hard_reset("test reset").await;

    assert_eq!(client.list_calls().await.len(), 0);
    assert_eq!(client.get_client_stats().await.current_call, None);
    assert_eq!(client.mode().await, ClientMode::Suspended);
    assert!(!client.poll_eligible().await);
}
