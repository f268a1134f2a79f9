// Common helpers for the bridge integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use lyrion_mpris::config::BridgeConfig;
use lyrion_mpris::data::PlayerView;
use lyrion_mpris::mpris::ExportSink;
use lyrion_mpris::players::lms::{HttpRequest, HttpResponse, HttpTransport, LmsRpcClient, TransportError};
use lyrion_mpris::Bridge;

/// Fake LMS server: answers `status` with the result stored for the player and
/// every other command with an empty result
#[derive(Default)]
pub struct ScriptedTransport {
    statuses: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<Value>>,
    delay: Mutex<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_status(&self, player_id: &str, result: Value) {
        self.statuses.lock().unwrap().insert(player_id.to_string(), result);
    }

    /// Delay every answer, to keep polls in flight
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// `params` of every request, in order
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn status_requests(&self) -> usize {
        self.requests().iter().filter(|p| p[1][0] == "status").count()
    }

    /// Command arrays of everything that was not a status poll
    pub fn commands(&self) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|p| p[1][0] != "status")
            .map(|p| p[1].clone())
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let body: Value = serde_json::from_str(&request.body).map_err(|e| TransportError::Request(e.to_string()))?;
        let params = body["params"].clone();
        self.requests.lock().unwrap().push(params.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = if params[1][0] == "status" {
            let player = params[0].as_str().unwrap_or_default();
            self.statuses.lock().unwrap().get(player).cloned()
        } else {
            Some(json!({}))
        };

        Ok(match result {
            Some(result) => HttpResponse {
                status: 200,
                body: serde_json::to_vec(&json!({ "id": 1, "result": result })).unwrap(),
            },
            None => HttpResponse {
                status: 500,
                body: b"unknown player".to_vec(),
            },
        })
    }
}

#[derive(Default)]
pub struct Recorder {
    pub published: Vec<PlayerView>,
    pub seeked: Vec<i64>,
    pub releases: usize,
}

/// Export that records everything the engine hands it
#[derive(Clone, Default)]
pub struct RecordingSink(pub Arc<Mutex<Recorder>>);

impl RecordingSink {
    pub fn last(&self) -> Option<PlayerView> {
        self.0.lock().unwrap().published.last().cloned()
    }

    pub fn published(&self) -> Vec<PlayerView> {
        self.0.lock().unwrap().published.clone()
    }

    pub fn seeked(&self) -> Vec<i64> {
        self.0.lock().unwrap().seeked.clone()
    }

    pub fn releases(&self) -> usize {
        self.0.lock().unwrap().releases
    }
}

impl ExportSink for RecordingSink {
    fn publish(&mut self, view: &PlayerView) {
        self.0.lock().unwrap().published.push(view.clone());
    }

    fn emit_seeked(&mut self, position_us: i64) {
        self.0.lock().unwrap().seeked.push(position_us);
    }

    fn release(&mut self) {
        self.0.lock().unwrap().releases += 1;
    }
}

pub const PLAYER_ID: &str = "aa:bb";

pub fn configured() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.server_address = "lms.local".to_string();
    config.player_id = PLAYER_ID.to_string();
    config
}

pub fn bridge(transport: &Arc<ScriptedTransport>, config: BridgeConfig) -> (Bridge<RecordingSink>, RecordingSink) {
    let sink = RecordingSink::default();
    let bridge = Bridge::new(LmsRpcClient::new(transport.clone()), sink.clone(), config);
    (bridge, sink)
}

/// Status of a player in the middle of a track
pub fn playing_status(track_id: &str, title: &str, elapsed: f64) -> Value {
    json!({
        "mode": "play",
        "time": elapsed,
        "mixer volume": 37,
        "playlist repeat": 0,
        "playlist shuffle": 0,
        "player_name": "Kitchen",
        "playlist_loop": [{
            "id": track_id,
            "title": title,
            "artist": "Miles Davis",
            "album": "Kind of Blue",
            "coverid": "deadbeef",
            "duration": 300.0
        }]
    })
}

/// Let spawned tasks run without moving past the next poll
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
