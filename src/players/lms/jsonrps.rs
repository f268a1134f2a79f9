use std::sync::Arc;

use log::{debug, error, trace, warn};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ConnectionConfig;
use super::status::RawStatus;
use super::transport::{HttpRequest, HttpTransport, ReqwestTransport, TransportError};

/// The standard JSON-RPC path for Lyrion Music Server
pub const JSONRPC_PATH: &str = "/jsonrpc.js";

/// LMS only knows one JSON-RPC method
pub const JSONRPC_METHOD: &str = "slim.request";

/// Tags requested with `status`: artist, album, artwork, coverid, remote
/// metadata, artwork_track_id, duration
pub const STATUS_TAGS: &str = "tags:alcoJtjd";

/// Upper bound for `players 0 <n>`
pub const MAX_PLAYERS: u32 = 200;

/// Errors that can occur when interacting with the LMS JSON-RPC API
#[derive(Debug, thiserror::Error)]
pub enum LmsRpcError {
    #[error("HTTP request error: {0}")]
    Network(#[from] TransportError),

    #[error("LMS HTTP {status}")]
    HttpStatus { status: u16, body: String },

    #[error("Empty response from server")]
    EmptyResponse,

    #[error("{}", protocol_message(.code, .message))]
    Protocol { code: Option<i64>, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

fn protocol_message(code: &Option<i64>, message: &str) -> String {
    match code {
        Some(code) => format!("LMS error {}: {}", code, message),
        None => format!("LMS error: {}", message),
    }
}

const UNKNOWN_ERROR: &str = "Unknown LMS error";

/// `["status", "-", 1, "tags:alcoJtjd"]`
pub fn status_request() -> Vec<Value> {
    vec![json!("status"), json!("-"), json!(1), json!(STATUS_TAGS)]
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    id: u32,
    method: &'a str,
    params: [Value; 2],
}

/// Player as listed by `players`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEntry {
    pub id: String,
    pub name: String,
}

/// Error carried in a response envelope, either at the top level or inside `result`
fn envelope_error(response: &Value) -> Option<LmsRpcError> {
    let raw = response.get("error")
        .filter(|e| !e.is_null())
        .or_else(|| response.get("result")
            .and_then(|r| r.get("error"))
            .filter(|e| !e.is_null()))?;

    let (code, message) = match raw {
        Value::Object(fields) => {
            let code = fields.get("code").and_then(|c| match c {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            });
            let message = fields.get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or(UNKNOWN_ERROR)
                .to_string();
            (code, message)
        }
        Value::String(message) if !message.is_empty() => (None, message.clone()),
        _ => (None, UNKNOWN_ERROR.to_string()),
    };
    Some(LmsRpcError::Protocol { code, message })
}

/// LMS JSON-RPC client for communicating with a Lyrion Music Server.
///
/// The client holds no connection settings of its own: every call receives the
/// `ConnectionConfig` snapshot it should run against.
#[derive(Clone)]
pub struct LmsRpcClient {
    transport: Arc<dyn HttpTransport>,
}

impl LmsRpcClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        LmsRpcClient { transport }
    }

    /// Client backed by `reqwest` with the default timeout
    pub fn with_reqwest() -> Self {
        Self::new(Arc::new(ReqwestTransport::new()))
    }

    /// Send a raw command and return the decoded response envelope.
    ///
    /// # Arguments
    /// * `player_id` - MAC address of the player, or "" for server-level commands
    /// * `command` - Command array, e.g. `["playlist", "jump", "+1"]`
    async fn post(&self, config: &ConnectionConfig, player_id: &str, command: Vec<Value>) -> Result<Value, LmsRpcError> {
        let request = JsonRpcRequest {
            id: 1,
            method: JSONRPC_METHOD,
            params: [Value::String(player_id.to_string()), Value::Array(command)],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| LmsRpcError::Malformed(e.to_string()))?;
        let url = config.rpc_url();
        trace!("LMS request to {}: {}", url, body);

        let response = self.transport.post_json(HttpRequest {
            url,
            body,
            credentials: config.credentials.clone(),
        }).await?;

        if !response.is_success() {
            let body = response.text();
            error!("LMS HTTP {}: {}", response.status, body);
            return Err(LmsRpcError::HttpStatus { status: response.status, body });
        }

        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Err(LmsRpcError::EmptyResponse);
        }

        let envelope: Value = serde_json::from_slice(&response.body).map_err(|e| {
            debug!("Unparseable LMS response: {}", response.text());
            LmsRpcError::Malformed(e.to_string())
        })?;

        if let Some(err) = envelope_error(&envelope) {
            return Err(err);
        }
        Ok(envelope)
    }

    /// Send a command and return its `result`
    pub async fn request(&self, config: &ConnectionConfig, player_id: &str, command: Vec<Value>) -> Result<Value, LmsRpcError> {
        let envelope = self.post(config, player_id, command).await?;
        match envelope.get("result") {
            Some(result) if !result.is_null() => Ok(result.clone()),
            _ => Err(LmsRpcError::Malformed("LMS response missing result".to_string())),
        }
    }

    /// Query the player status
    pub async fn fetch_status(&self, config: &ConnectionConfig, player_id: &str, request: Vec<Value>) -> Result<RawStatus, LmsRpcError> {
        let result = self.request(config, player_id, request).await?;
        RawStatus::from_result(result)
            .ok_or_else(|| LmsRpcError::Malformed("status result is not an object".to_string()))
    }

    /// Send a control command. Failures are logged, never returned.
    pub async fn send_command(&self, config: &ConnectionConfig, player_id: &str, command: Vec<Value>) {
        let printable = Value::Array(command.clone());
        match self.post(config, player_id, command).await {
            Ok(_) => debug!("LMS command {} sent to {}", printable, player_id),
            Err(LmsRpcError::EmptyResponse) => debug!("LMS command {} sent to {} (empty response)", printable, player_id),
            Err(err @ LmsRpcError::Protocol { .. }) => error!("LMS command {} rejected: {}", printable, err),
            Err(err) => warn!("LMS command {} failed: {}", printable, err),
        }
    }

    /// Get a list of players known to the server
    pub async fn list_players(&self, config: &ConnectionConfig) -> Result<Vec<PlayerEntry>, LmsRpcError> {
        let result = self.request(config, "", vec![json!("players"), json!(0), json!(MAX_PLAYERS)]).await?;

        let players = match result.get("players_loop").and_then(Value::as_array) {
            Some(players) => players,
            None => return Ok(Vec::new()),
        };

        Ok(players.iter()
            .filter_map(|player| {
                let id = match player.get("playerid")? {
                    Value::String(id) => id.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                if id.is_empty() {
                    return None;
                }
                let name = player.get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(PlayerEntry { id, name })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::players::lms::transport::HttpResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every request with the same canned response and records requests
    struct CannedTransport {
        response: Result<HttpResponse, TransportError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl CannedTransport {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(CannedTransport {
                response: Ok(HttpResponse { status, body: body.as_bytes().to_vec() }),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: TransportError) -> Arc<Self> {
            Arc::new(CannedTransport { response: Err(err), requests: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl HttpTransport for CannedTransport {
        async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.response.clone()
        }
    }

    fn config() -> ConnectionConfig {
        let mut config = BridgeConfig::default();
        config.server_address = "lms.local".to_string();
        config.player_id = "aa:bb".to_string();
        config.server_username = "admin".to_string();
        config.server_password = "pw".to_string();
        config.connection()
    }

    #[tokio::test]
    async fn test_status_request_envelope() {
        let transport = CannedTransport::new(200, r#"{"id":1,"result":{"mode":"play"}}"#);
        let client = LmsRpcClient::new(transport.clone());

        let status = client.fetch_status(&config(), "aa:bb", status_request()).await.unwrap();
        assert_eq!(status.mode(), Some("play"));

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://lms.local:9000/jsonrpc.js");
        assert_eq!(requests[0].credentials.as_ref().unwrap().password(), "pw");
        let body: Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body, json!({
            "id": 1,
            "method": "slim.request",
            "params": ["aa:bb", ["status", "-", 1, "tags:alcoJtjd"]]
        }));
    }

    #[tokio::test]
    async fn test_error_classification() {
        let client = LmsRpcClient::new(CannedTransport::new(401, "denied"));
        match client.fetch_status(&config(), "aa:bb", status_request()).await {
            Err(LmsRpcError::HttpStatus { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "denied");
            }
            other => panic!("unexpected {:?}", other),
        }

        let client = LmsRpcClient::new(CannedTransport::new(200, ""));
        assert!(matches!(
            client.fetch_status(&config(), "aa:bb", status_request()).await,
            Err(LmsRpcError::EmptyResponse)
        ));

        let client = LmsRpcClient::new(CannedTransport::new(200, "<html>"));
        assert!(matches!(
            client.fetch_status(&config(), "aa:bb", status_request()).await,
            Err(LmsRpcError::Malformed(_))
        ));

        let client = LmsRpcClient::new(CannedTransport::new(200, r#"{"id":1}"#));
        assert!(matches!(
            client.fetch_status(&config(), "aa:bb", status_request()).await,
            Err(LmsRpcError::Malformed(_))
        ));

        let client = LmsRpcClient::new(CannedTransport::failing(TransportError::Timeout));
        assert!(matches!(
            client.fetch_status(&config(), "aa:bb", status_request()).await,
            Err(LmsRpcError::Network(TransportError::Timeout))
        ));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let client = LmsRpcClient::new(CannedTransport::new(200, r#"{"error":{"code":-32601,"message":"Method not found"}}"#));
        match client.fetch_status(&config(), "aa:bb", status_request()).await {
            Err(err @ LmsRpcError::Protocol { .. }) => {
                assert_eq!(err.to_string(), "LMS error -32601: Method not found");
            }
            other => panic!("unexpected {:?}", other),
        }

        let client = LmsRpcClient::new(CannedTransport::new(200, r#"{"result":{"error":"invalid player"}}"#));
        match client.fetch_status(&config(), "aa:bb", status_request()).await {
            Err(LmsRpcError::Protocol { code, message }) => {
                assert_eq!(code, None);
                assert_eq!(message, "invalid player");
            }
            other => panic!("unexpected {:?}", other),
        }

        let client = LmsRpcClient::new(CannedTransport::new(200, r#"{"error":{}}"#));
        match client.fetch_status(&config(), "aa:bb", status_request()).await {
            Err(LmsRpcError::Protocol { message, .. }) => assert_eq!(message, UNKNOWN_ERROR),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_command_swallows_failures() {
        let transport = CannedTransport::new(500, "boom");
        let client = LmsRpcClient::new(transport.clone());
        client.send_command(&config(), "aa:bb", vec![json!("playlist"), json!("jump"), json!("+1")]).await;

        let requests = transport.requests.lock().unwrap();
        let body: Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["params"], json!(["aa:bb", ["playlist", "jump", "+1"]]));
    }

    #[tokio::test]
    async fn test_list_players_skips_entries_without_id() {
        let transport = CannedTransport::new(200, r#"{"result":{"count":3,"players_loop":[
            {"playerid":"aa:bb","name":"Kitchen"},
            {"name":"Ghost"},
            {"playerid":"cc:dd"}
        ]}}"#);
        let client = LmsRpcClient::new(transport.clone());
        let players = client.list_players(&config()).await.unwrap();

        assert_eq!(players, vec![
            PlayerEntry { id: "aa:bb".to_string(), name: "Kitchen".to_string() },
            PlayerEntry { id: "cc:dd".to_string(), name: String::new() },
        ]);

        let requests = transport.requests.lock().unwrap();
        let body: Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["params"], json!(["", ["players", 0, 200]]));
    }
}
