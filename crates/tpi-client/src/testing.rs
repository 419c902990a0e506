//! Test utilities for tpi-client
//!
//! Provides an in-process stand-in for the BMC firmware plus a test server
//! wrapper, so integration tests can assert the exact wire traffic without
//! a board on the bench.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::any;
use axum::Router;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;
use url::form_urlencoded;

use crate::query::Resource;
use crate::types::{Node, NodePower, OnOff, UsbStatus};
use crate::{Result, TpiClient};

/// Path the mock serves the control API under, mirroring the board's
/// `/api/bmc` endpoint.
pub const BMC_PATH: &str = "/api/bmc";

// =============================================================================
// Test Server
// =============================================================================

/// A test server that automatically shuts down when dropped
///
/// Serves a [`MockBmc`] router on an ephemeral port and exposes a
/// [`TpiClient`] pointed at its [`BMC_PATH`] endpoint.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: TpiClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    ///
    /// # Example
    ///
    /// ```ignore
    /// use tpi_client::testing::{MockBmc, TestServer};
    ///
    /// let bmc = MockBmc::new();
    /// let server = TestServer::start(bmc.router()).await?;
    /// let power = server.client.power().await?;
    /// ```
    pub async fn start(router: Router) -> Result<Self> {
        Self::start_with_timeout(router, Duration::from_secs(5), Duration::from_secs(2)).await
    }

    /// Create a new test server with custom timeouts
    pub async fn start_with_timeout(
        router: Router,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        // Spawn the server
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let endpoint = format!("http://{}{}", addr, BMC_PATH);
        let client = TpiClient::with_config(&endpoint, timeout, connect_timeout)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the endpoint URL of the test server
    pub fn endpoint(&self) -> String {
        format!("http://{}{}", self.addr, BMC_PATH)
    }

    /// Get a reference to the client
    pub fn client(&self) -> &TpiClient {
        &self.client
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal if not already done
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Abort the task if still running
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Mock BMC
// =============================================================================

/// One request as the mock received it, kept raw for exact wire assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Raw query string, undecoded.
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RecordedRequest {
    /// Value of one request header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
struct BmcState {
    node_info: [String; 4],
    power: NodePower,
    usb: UsbStatus,
    uart: [String; 4],
    firmware: Option<Bytes>,
    requests: Vec<RecordedRequest>,
    canned_response: Option<(u16, String)>,
}

impl Default for BmcState {
    fn default() -> Self {
        Self {
            node_info: [
                "Raspberry Pi CM4".to_string(),
                "Raspberry Pi CM4".to_string(),
                "Jetson Nano".to_string(),
                "empty".to_string(),
            ],
            power: NodePower::all_off(),
            usb: UsbStatus {
                mode: OnOff::Off,
                node: Node::Node1,
            },
            uart: Default::default(),
            firmware: None,
            requests: Vec::new(),
            canned_response: None,
        }
    }
}

/// In-process stand-in for the BMC firmware.
///
/// Implements the full get/set wire table against in-memory state: writes
/// are reflected by subsequent reads, firmware uploads are captured byte
/// for byte, and every request is recorded raw so tests can assert the
/// exact query string, headers and body the client put on the wire.
#[derive(Clone, Default)]
pub struct MockBmc {
    state: Arc<Mutex<BmcState>>,
}

impl MockBmc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router serving the control API at [`BMC_PATH`]
    pub fn router(&self) -> Router {
        Router::new()
            .route(BMC_PATH, any(handle))
            .with_state(self.state.clone())
    }

    /// Every request received so far, in arrival order
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Current power state
    pub fn power(&self) -> NodePower {
        self.state.lock().power
    }

    /// Current USB routing state
    pub fn usb(&self) -> UsbStatus {
        self.state.lock().usb
    }

    /// Commands received on one slot's UART, newline-separated
    pub fn uart_log(&self, node: Node) -> String {
        self.state.lock().uart[node.as_index() as usize].clone()
    }

    /// The last uploaded firmware image, if any
    pub fn firmware(&self) -> Option<Bytes> {
        self.state.lock().firmware.clone()
    }

    /// Make every following request answer with this status and raw body
    /// instead of the protocol response. `None` restores normal behavior.
    pub fn set_canned_response(&self, response: Option<(u16, String)>) {
        self.state.lock().canned_response = response;
    }
}

fn ack() -> String {
    json!({"response": [{"result": "ok"}]}).to_string()
}

fn bad_request(message: &str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.to_string())
}

async fn handle(
    State(state): State<Arc<Mutex<BmcState>>>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let query = query.unwrap_or_default();
    let mut state = state.lock();

    state.requests.push(RecordedRequest {
        method: method.to_string(),
        query: query.clone(),
        headers: headers
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect(),
        body: body.clone(),
    });

    if let Some((status, body)) = state.canned_response.clone() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, body);
    }

    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    let param = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    let resource: Resource = match param("type").map(str::parse) {
        Some(Ok(resource)) => resource,
        _ => return bad_request("missing or unknown type"),
    };

    match param("opt") {
        Some("get") => {
            let body = match resource {
                Resource::NodeInfo => json!({"response": [{
                    "node1": state.node_info[0],
                    "node2": state.node_info[1],
                    "node3": state.node_info[2],
                    "node4": state.node_info[3],
                }]}),
                Resource::Usb => json!({"response": [{
                    "mode": state.usb.mode.as_flag(),
                    "node": state.usb.node.as_index(),
                }]}),
                Resource::Power => json!({"response": [{
                    "node1": state.power.node1.as_flag(),
                    "node2": state.power.node2.as_flag(),
                    "node3": state.power.node3.as_flag(),
                    "node4": state.power.node4.as_flag(),
                }]}),
                Resource::Other => json!({"response": [{
                    "version": "1.0.1",
                    "buildtime": "2023-03-14 10:35:28",
                    "ip": "192.168.1.91",
                    "mac": "02:00:17:92:a1:b3",
                }]}),
                Resource::SdCard => json!({"response": [{
                    "total": 30735872u64,
                    "free": 30270464u64,
                    "use": 465408u64,
                }]}),
                Resource::Uart => {
                    let node = match parse_node(param("node")) {
                        Some(node) => node,
                        None => return bad_request("missing or invalid node"),
                    };
                    json!({"response": [{
                        "uart": state.uart[node.as_index() as usize],
                    }]})
                }
                Resource::Firmware | Resource::Network => {
                    return bad_request("resource is not readable")
                }
            };
            (StatusCode::OK, body.to_string())
        }
        Some("set") => {
            match resource {
                Resource::Usb => {
                    let mode = param("mode")
                        .and_then(|v| v.parse::<u8>().ok())
                        .and_then(|v| OnOff::try_from(v).ok());
                    let node = parse_node(param("node"));
                    match (mode, node) {
                        (Some(mode), Some(node)) => state.usb = UsbStatus { mode, node },
                        _ => return bad_request("missing or invalid mode/node"),
                    }
                }
                Resource::Power => {
                    for node in Node::ALL {
                        let flag = param(node.as_key())
                            .and_then(|v| v.parse::<u8>().ok())
                            .and_then(|v| OnOff::try_from(v).ok());
                        match flag {
                            Some(flag) => state.power = state.power.with_node(node, flag),
                            None => return bad_request("missing or invalid power flag"),
                        }
                    }
                }
                Resource::Uart => {
                    let node = parse_node(param("node"));
                    match (node, param("cmd")) {
                        (Some(node), Some(cmd)) => {
                            let log = &mut state.uart[node.as_index() as usize];
                            log.push_str(cmd);
                            log.push('\n');
                        }
                        _ => return bad_request("missing or invalid node/cmd"),
                    }
                }
                Resource::Firmware => {
                    state.firmware = Some(body);
                }
                Resource::Network => {
                    if param("cmd") != Some("reset") {
                        return bad_request("unknown network command");
                    }
                }
                Resource::NodeInfo | Resource::Other | Resource::SdCard => {
                    return bad_request("resource is not writable")
                }
            }
            (StatusCode::OK, ack())
        }
        _ => bad_request("missing or unknown opt"),
    }
}

fn parse_node(value: Option<&str>) -> Option<Node> {
    value
        .and_then(|v| v.parse::<u8>().ok())
        .and_then(|v| Node::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_format() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let url = format!("http://{}{}", addr, BMC_PATH);
        assert_eq!(url, "http://127.0.0.1:8080/api/bmc");
    }

    #[test]
    fn test_recorded_request_header_lookup() {
        let request = RecordedRequest {
            method: "POST".to_string(),
            query: "opt=set&type=usb".to_string(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::new(),
        };
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.header("x-missing"), None);
    }
}
