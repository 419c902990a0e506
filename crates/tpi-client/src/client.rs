//! BMC HTTP client implementation

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Result, TpiClientError};
use crate::query::{GetRequest, Resource, SetRequest};
use crate::types::*;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request transport passthrough.
///
/// Extra headers and an optional timeout are applied to the request before
/// the client's own fields, so the client's method, content-type and body
/// always win; everything else passes through unchanged. Cancellation
/// beyond the timeout is dropping the returned future.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header to send with this request.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Override the client's request timeout for this request only.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Client for a BMC's HTTP control API
///
/// Holds the endpoint URL and the HTTP connection pool; no other state.
/// Every method is one independent request/response round trip, so the
/// client can be cloned and called concurrently freely.
#[derive(Debug, Clone)]
pub struct TpiClient {
    client: Client,
    endpoint: Url,
}

impl TpiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `endpoint` - Control API endpoint of the board
    ///   (e.g., "http://turingpi.local/api/bmc")
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_config(endpoint, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new client with custom timeouts
    pub fn with_config(
        endpoint: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let endpoint = Url::parse(endpoint)?;

        Ok(Self { client, endpoint })
    }

    /// Create a new client that sends the given headers with every request.
    ///
    /// The BMC itself has no authentication scheme; this is transport-level
    /// passthrough for deployments that put a proxy in front of the board.
    pub fn with_default_headers(endpoint: &str, headers: HeaderMap) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()?;

        let endpoint = Url::parse(endpoint)?;

        Ok(Self { client, endpoint })
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Get a reference to the underlying HTTP client.
    ///
    /// Useful for making custom requests while reusing the client's
    /// connection pool and default headers.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    // =========================================================================
    // Core Operations
    // =========================================================================

    /// Issue a read against the BMC.
    ///
    /// `T` is the payload the caller expects for this resource type; the
    /// contract is compile-time only, so a caller that wants the body as-is
    /// can pick `serde_json::Value`. The typed methods below choose `T` for
    /// each resource.
    pub async fn get<T: DeserializeOwned>(&self, request: GetRequest) -> Result<Envelope<T>> {
        self.get_with(request, RequestOptions::default()).await
    }

    /// [`get`](Self::get) with per-request transport options.
    #[instrument(skip(self, options))]
    pub async fn get_with<T: DeserializeOwned>(
        &self,
        request: GetRequest,
        options: RequestOptions,
    ) -> Result<Envelope<T>> {
        let url = self.request_url("get", request.resource(), &request.query_pairs());
        debug!("GET {}", url);

        let mut builder = self.client.get(url).headers(options.headers);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        self.handle_response(response).await
    }

    /// Issue a write against the BMC.
    ///
    /// Every write answers the same acknowledgement envelope.
    pub async fn set(&self, request: SetRequest) -> Result<Envelope<Ack>> {
        self.set_with(request, RequestOptions::default()).await
    }

    /// [`set`](Self::set) with per-request transport options.
    ///
    /// The request is always sent with `Content-Type: application/json`,
    /// including the firmware case where the body is a raw image. Deployed
    /// BMC firmware has only ever seen that header from this protocol, so
    /// the header is kept for wire compatibility even though it does not
    /// describe the firmware body.
    #[instrument(skip(self, request, options), fields(resource = %request.resource()))]
    pub async fn set_with(
        &self,
        request: SetRequest,
        options: RequestOptions,
    ) -> Result<Envelope<Ack>> {
        let resource = request.resource();
        let (pairs, body) = request.into_parts();
        let url = self.request_url("set", resource, &pairs);
        debug!("POST {}", url);

        // Insert rather than append, so a caller-supplied content-type can
        // never ride along next to the protocol's own.
        let mut headers = options.headers;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = self.client.post(url).headers(headers);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(file) = body {
            builder = builder.body(file);
        }

        let response = builder.send().await?;
        self.handle_response(response).await
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Description strings of the four node slots
    pub async fn node_info(&self) -> Result<Envelope<NodeInfo>> {
        self.get(GetRequest::NodeInfo).await
    }

    /// Current USB routing state
    pub async fn usb(&self) -> Result<Envelope<UsbStatus>> {
        self.get(GetRequest::Usb).await
    }

    /// Power flags of the four node slots
    pub async fn power(&self) -> Result<Envelope<NodePower>> {
        self.get(GetRequest::Power).await
    }

    /// BMC version, build time and network identity
    pub async fn system_info(&self) -> Result<Envelope<SystemInfo>> {
        self.get(GetRequest::Other).await
    }

    /// SD card usage counters
    pub async fn sdcard(&self) -> Result<Envelope<SdCardUsage>> {
        self.get(GetRequest::SdCard).await
    }

    /// Captured UART output of one slot
    pub async fn uart(&self, node: Node) -> Result<Envelope<UartOutput>> {
        self.get(GetRequest::Uart { node }).await
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Route the shared USB bus to one slot
    pub async fn set_usb(&self, mode: OnOff, node: Node) -> Result<Envelope<Ack>> {
        self.set(SetRequest::Usb { mode, node }).await
    }

    /// Set the power flags of all four slots
    pub async fn set_power(&self, power: NodePower) -> Result<Envelope<Ack>> {
        self.set(SetRequest::Power(power)).await
    }

    /// Send a command line to one slot's UART
    pub async fn send_uart(&self, node: Node, cmd: impl Into<String>) -> Result<Envelope<Ack>> {
        self.set(SetRequest::Uart {
            node,
            cmd: cmd.into(),
        })
        .await
    }

    /// Upload a firmware image to the BMC.
    ///
    /// The image travels as the raw request body. See
    /// [`set_with`](Self::set_with) for the content-type header the request
    /// carries.
    pub async fn flash_firmware(&self, file: Bytes) -> Result<Envelope<Ack>> {
        self.set(SetRequest::Firmware { file }).await
    }

    /// Reset the BMC network stack
    pub async fn reset_network(&self) -> Result<Envelope<Ack>> {
        self.set(SetRequest::NetworkReset).await
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    /// Build the request URL: `endpoint?opt=<opt>&type=<resource>` plus the
    /// variant's own pairs, in that order.
    fn request_url(&self, opt: &str, resource: Resource, pairs: &[(&'static str, String)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("opt", opt);
            query.append_pair("type", resource.as_str());
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// Check the response status and deserialize the JSON envelope
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<Envelope<T>> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| TpiClientError::Parse(e.to_string()))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| format!("HTTP {}", status));
            Err(TpiClientError::server(status.as_u16(), message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = TpiClient::new("http://turingpi.local/api/bmc");
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_endpoint() {
        let client = TpiClient::new("not a url");
        assert!(matches!(client, Err(TpiClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_get_power_url() {
        let client = TpiClient::new("http://turingpi.local/api/bmc").unwrap();
        let url = client.request_url("get", Resource::Power, &[]);
        assert_eq!(
            url.as_str(),
            "http://turingpi.local/api/bmc?opt=get&type=power"
        );
    }

    #[test]
    fn test_set_usb_url() {
        let client = TpiClient::new("http://turingpi.local/api/bmc").unwrap();
        let request = SetRequest::Usb {
            mode: OnOff::On,
            node: Node::Node3,
        };
        let resource = request.resource();
        let (pairs, _) = request.into_parts();
        let url = client.request_url("set", resource, &pairs);
        assert_eq!(
            url.as_str(),
            "http://turingpi.local/api/bmc?opt=set&type=usb&mode=1&node=2"
        );
    }

    #[test]
    fn test_get_uart_url() {
        let client = TpiClient::new("http://turingpi.local/api/bmc").unwrap();
        let request = GetRequest::Uart { node: Node::Node2 };
        let url = client.request_url("get", request.resource(), &request.query_pairs());
        assert_eq!(
            url.as_str(),
            "http://turingpi.local/api/bmc?opt=get&type=uart&node=1"
        );
    }
}
