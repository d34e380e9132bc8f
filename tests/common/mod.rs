//! Shared fakes for the scenario tests
//!
//! A scripted HTTP transport (canned responses per endpoint, request log,
//! concurrency gauge), a recording media engine that appends every
//! connect/unpublish/disconnect to a shared ordering trace, and a recording
//! cue player.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use livecall_client_core::call::{CallId, CallState, RoomId};
use livecall_client_core::client::cues::{CuePlayer, Tone};
use livecall_client_core::media::{DeviceSelection, MediaEngine, MediaSession, TrackKind};
use livecall_client_core::signaling::http::{HttpClient, HttpRequest, HttpResponse};
use livecall_client_core::{ClientBuilder, ClientConfig, ClientError, ClientManager, ClientResult};

/// One canned transport outcome
pub enum Scripted {
    /// Respond with this status and JSON body
    Respond(u16, Value),
    /// Fail at the transport level
    TransportError(String),
}

/// A request the fake transport saw
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

/// Scripted HTTP transport
///
/// Scripted entries are consumed one per request; once a path's queue is
/// empty the per-path default (overridable) applies.
pub struct ScriptedHttp {
    queues: Mutex<HashMap<String, VecDeque<Scripted>>>,
    defaults: Mutex<HashMap<String, (u16, Value)>>,
    delays: Mutex<HashMap<String, Duration>>,
    log: Mutex<Vec<SeenRequest>>,
    concurrency: Mutex<HashMap<String, (usize, usize)>>, // (current, max)
}

impl ScriptedHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queues: Mutex::new(HashMap::new()),
            defaults: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            concurrency: Mutex::new(HashMap::new()),
        })
    }

    /// Queue one response for `path`
    pub fn script(&self, path: &str, status: u16, body: Value) {
        self.queues
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Scripted::Respond(status, body));
    }

    /// Queue one transport failure for `path`
    pub fn script_transport_error(&self, path: &str, reason: &str) {
        self.queues
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Scripted::TransportError(reason.to_string()));
    }

    /// Replace the fallback response for `path`
    pub fn set_default(&self, path: &str, status: u16, body: Value) {
        self.defaults
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body));
    }

    /// Delay every response on `path`
    pub fn set_delay(&self, path: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(path.to_string(), delay);
    }

    /// All requests seen on `path`
    pub fn requests(&self, path: &str) -> Vec<SeenRequest> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests(path).len()
    }

    /// Highest number of simultaneously outstanding requests on `path`
    pub fn max_concurrent(&self, path: &str) -> usize {
        self.concurrency
            .lock()
            .unwrap()
            .get(path)
            .map(|(_, max)| *max)
            .unwrap_or(0)
    }

    fn builtin_default(path: &str) -> (u16, Value) {
        match path {
            "check-incoming" => (200, json!({"has_incoming": false})),
            "status" => (200, json!({"call": {"status": "calling"}})),
            "start" => (200, json!({"success": true, "call_id": 1, "room_name": "room-1"})),
            "answer" => (
                200,
                json!({"success": true, "room_name": "room-1", "caller": {"id": "u-x", "name": null}}),
            ),
            "balance" => (200, json!({"balance": 100})),
            _ => (200, json!({"success": true})),
        }
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let path = request
            .url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        let bearer = request
            .headers
            .get("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string);
        let body = request
            .body
            .as_deref()
            .and_then(|b| serde_json::from_slice(b).ok());
        self.log.lock().unwrap().push(SeenRequest {
            path: path.clone(),
            body,
            bearer,
        });

        {
            let mut gauges = self.concurrency.lock().unwrap();
            let entry = gauges.entry(path.clone()).or_insert((0, 0));
            entry.0 += 1;
            entry.1 = entry.1.max(entry.0);
        }

        let delay = self.delays.lock().unwrap().get(&path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(|queue| queue.pop_front());

        {
            let mut gauges = self.concurrency.lock().unwrap();
            if let Some(entry) = gauges.get_mut(&path) {
                entry.0 -= 1;
            }
        }

        match scripted {
            Some(Scripted::Respond(status, body)) => {
                Ok(HttpResponse::new(status, serde_json::to_vec(&body)?))
            }
            Some(Scripted::TransportError(reason)) => Err(anyhow::anyhow!(reason)),
            None => {
                let (status, body) = self
                    .defaults
                    .lock()
                    .unwrap()
                    .get(&path)
                    .cloned()
                    .unwrap_or_else(|| Self::builtin_default(&path));
                Ok(HttpResponse::new(status, serde_json::to_vec(&body)?))
            }
        }
    }
}

/// Media engine whose sessions append every step to a shared trace
pub struct RecordingMediaEngine {
    pub trace: Arc<Mutex<Vec<String>>>,
    /// Device ids sessions report as currently capturing
    pub live_devices: Mutex<DeviceSelection>,
    pub fail_connect: AtomicBool,
}

impl RecordingMediaEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            trace: Arc::new(Mutex::new(Vec::new())),
            live_devices: Mutex::new(DeviceSelection {
                camera_id: Some("auto-cam".to_string()),
                microphone_id: Some("auto-mic".to_string()),
            }),
            fail_connect: AtomicBool::new(false),
        })
    }

    pub fn trace(&self) -> Vec<String> {
        self.trace.lock().unwrap().clone()
    }
}

struct RecordingSession {
    room: RoomId,
    trace: Arc<Mutex<Vec<String>>>,
    devices: DeviceSelection,
    published: Mutex<Vec<TrackKind>>,
}

#[async_trait]
impl MediaSession for RecordingSession {
    fn room(&self) -> &RoomId {
        &self.room
    }

    fn published_tracks(&self) -> Vec<TrackKind> {
        self.published.lock().unwrap().clone()
    }

    async fn publish_track(&self, kind: TrackKind, _device_id: Option<&str>) -> ClientResult<()> {
        self.trace
            .lock()
            .unwrap()
            .push(format!("publish:{}:{}", self.room, kind));
        self.published.lock().unwrap().push(kind);
        Ok(())
    }

    async fn unpublish_track(&self, kind: TrackKind) -> ClientResult<()> {
        self.trace
            .lock()
            .unwrap()
            .push(format!("unpublish:{}:{}", self.room, kind));
        self.published.lock().unwrap().retain(|k| *k != kind);
        Ok(())
    }

    async fn disconnect(&self) {
        self.trace
            .lock()
            .unwrap()
            .push(format!("disconnect:{}", self.room));
    }

    fn current_devices(&self) -> DeviceSelection {
        self.devices.clone()
    }

    fn remote_participant_count(&self) -> usize {
        1
    }
}

#[async_trait]
impl MediaEngine for RecordingMediaEngine {
    async fn connect(
        &self,
        room: &RoomId,
        devices: &DeviceSelection,
    ) -> ClientResult<Box<dyn MediaSession>> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ClientError::MediaSessionFailed {
                reason: "scripted connect failure".to_string(),
            });
        }
        self.trace.lock().unwrap().push(format!(
            "connect:{}:cam={}:mic={}",
            room,
            devices.camera_id.as_deref().unwrap_or("none"),
            devices.microphone_id.as_deref().unwrap_or("none"),
        ));
        Ok(Box::new(RecordingSession {
            room: room.clone(),
            trace: self.trace.clone(),
            devices: self.live_devices.lock().unwrap().clone(),
            published: Mutex::new(vec![TrackKind::Camera, TrackKind::Microphone]),
        }))
    }
}

/// Cue player that records tone starts and stops
pub struct RecordingCuePlayer {
    pub log: Mutex<Vec<String>>,
}

impl RecordingCuePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { log: Mutex::new(Vec::new()) })
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CuePlayer for RecordingCuePlayer {
    async fn start_tone(&self, tone: Tone) -> Result<()> {
        self.log.lock().unwrap().push(format!("start:{tone:?}"));
        Ok(())
    }

    async fn stop_tone(&self, tone: Tone) -> Result<()> {
        self.log.lock().unwrap().push(format!("stop:{tone:?}"));
        Ok(())
    }
}

/// Route test logs through the test harness when `RUST_LOG` is set
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fast timings so scenarios complete in tens of milliseconds
pub fn fast_config(local_user_id: &str) -> ClientConfig {
    ClientConfig::new("https://backend.test/api/calls/", local_user_id)
        .expect("valid base url")
        .with_bearer_token("test-token")
        .with_signaling_timeout(Duration::from_millis(500))
        .with_poll_interval(Duration::from_millis(20))
        .with_poll_throttle(Duration::from_millis(5))
        .with_status_poll_interval(Duration::from_millis(15))
}

pub fn build_client(
    http: Arc<ScriptedHttp>,
    engine: Arc<RecordingMediaEngine>,
    cues: Arc<RecordingCuePlayer>,
    local_user_id: &str,
) -> Arc<ClientManager> {
    init_test_logging();
    ClientBuilder::new(fast_config(local_user_id))
        .http_client(http)
        .media_engine(engine)
        .cue_player(cues)
        .build()
        .expect("client builds")
}

/// JSON body for a `check-incoming` poll reporting one invitation
pub fn incoming_body(call_id: u64, caller_id: &str, caller_name: &str, room: &str) -> Value {
    json!({
        "has_incoming": true,
        "incoming_call": {
            "id": call_id,
            "caller": {"id": caller_id, "name": caller_name},
            "room_name": room,
        }
    })
}

/// Poll until `cond` holds or `timeout` elapses
pub async fn wait_until<F>(mut cond: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until a specific call reaches `state`
pub async fn wait_for_call_state(
    client: &Arc<ClientManager>,
    call_id: &CallId,
    state: CallState,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(info) = client.get_call(call_id).await {
            if info.state == state {
                return true;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until the current call is ringing and return its id
pub async fn wait_for_ringing(client: &Arc<ClientManager>, timeout: Duration) -> Option<CallId> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(info) = client.current_call_info().await {
            if info.state == CallState::Ringing {
                return Some(info.call_id);
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
