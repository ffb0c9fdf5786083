// JSON-RPC protocol client: ping, version handshake and metrics fetch with bounded retries.

use crate::error::RpcError;
use crate::models::RawMetrics;
use crate::transport::{END_OF_FRAME, Transport};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const METHOD_PING: &str = "ping";
pub const METHOD_HANDSHAKE: &str = "health.api.handshake";
pub const METHOD_METRICS: &str = "get.health.metrics";

/// The only health API version this client speaks.
pub const API_VERSION: u64 = 2;

/// Default TCP port of the health API.
pub const DEFAULT_PORT: u16 = 12021;

/// Default number of ping/handshake/fetch attempts per poll.
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 2;

/// Responses longer than this are cut when traced.
const TRACE_RESPONSE_CHARS: usize = 300;

const MAX_REQUEST_ID: u32 = 99;

/// Auto-incrementing request ids. Past 99 the counter restarts from a random value in
/// [1, 10] rather than from 1.
#[derive(Debug, Clone)]
pub struct RequestIds {
    current: u32,
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIds {
    pub fn new() -> Self {
        Self::starting_at(random_seed())
    }

    /// Counter whose next id is derived from `current` (used by tests).
    pub fn starting_at(current: u32) -> Self {
        Self { current }
    }

    pub fn next_id(&mut self) -> u32 {
        self.current = if self.current > MAX_REQUEST_ID {
            random_seed()
        } else {
            self.current + 1
        };
        self.current
    }
}

fn random_seed() -> u32 {
    rand::thread_rng().gen_range(1..=10)
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    id: u32,
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// Serialize one request envelope and append the end-of-frame marker.
pub fn frame_request(id: u32, method: &str, params: Option<Value>) -> String {
    let req = RpcRequest {
        id,
        jsonrpc: "2.0",
        method,
        params,
    };
    // Serializing a struct of strings, ints and a Value cannot fail.
    let mut body = serde_json::to_string(&req).unwrap_or_default();
    body.push_str(END_OF_FRAME);
    body
}

/// Owns the transport and the request-id counter for one remote node.
pub struct RpcClient<T: Transport> {
    transport: T,
    address: String,
    port: u16,
    ids: RequestIds,
    fetch_attempts: u32,
    verbose: bool,
    reconnects: u64,
}

impl<T: Transport> RpcClient<T> {
    pub fn new(transport: T, address: impl Into<String>, port: u16) -> Self {
        Self {
            transport,
            address: address.into(),
            port,
            ids: RequestIds::new(),
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            verbose: false,
            reconnects: 0,
        }
    }

    pub fn with_fetch_attempts(mut self, attempts: u32) -> Self {
        self.fetch_attempts = attempts;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_request_ids(mut self, ids: RequestIds) -> Self {
        self.ids = ids;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Reconnects issued by the retry loop since construction.
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Open the connection. Failure is logged and reported; the next attempt reconnects.
    pub async fn connect(&mut self) -> bool {
        match self.transport.connect(&self.address, self.port).await {
            Ok(()) => true,
            Err(e) => {
                warn!(address = %self.address, port = self.port, error = %e, "connect failed");
                // Leave no half-open socket behind.
                let _ = self.transport.close().await;
                false
            }
        }
    }

    pub async fn close(&mut self) -> bool {
        match self.transport.close().await {
            Ok(()) => true,
            Err(e) => {
                debug!(address = %self.address, error = %e, "close failed");
                false
            }
        }
    }

    async fn call(&mut self, method: &'static str, params: Option<Value>) -> Result<Value, RpcError> {
        let id = self.ids.next_id();
        self.call_with_id(id, method, params).await
    }

    async fn call_with_id(
        &mut self,
        id: u32,
        method: &'static str,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        let request = frame_request(id, method, params);
        self.trace_request(&request);
        let response = self.transport.send_receive(&request).await?;
        self.trace_response(&response);
        Ok(response)
    }

    fn trace_request(&self, request: &str) {
        let request = request.trim_end_matches(END_OF_FRAME);
        if self.verbose {
            info!("--> {}", request);
        } else {
            debug!("--> {}", request);
        }
    }

    fn trace_response(&self, response: &Value) {
        let text = response.to_string();
        let shown: String = text.chars().take(TRACE_RESPONSE_CHARS).collect();
        if self.verbose {
            info!("<-- {}", shown);
        } else {
            debug!("<-- {}", shown);
        }
    }

    pub async fn ping(&mut self) -> Result<(), RpcError> {
        let resp = self.call(METHOD_PING, None).await?;
        match resp.get("result") {
            Some(Value::String(s)) if s == "pong" => Ok(()),
            Some(other) => Err(RpcError::UnexpectedPong(other.to_string())),
            None => Err(RpcError::MissingResult { method: METHOD_PING }),
        }
    }

    pub async fn handshake(&mut self) -> Result<(), RpcError> {
        let params = serde_json::json!({ "client_supported_versions": [API_VERSION] });
        let resp = self.call(METHOD_HANDSHAKE, Some(params)).await?;
        let selected = resp
            .get("result")
            .and_then(|r| r.get("server_selected_version"))
            .and_then(Value::as_u64);
        if selected == Some(API_VERSION) {
            Ok(())
        } else {
            Err(RpcError::VersionMismatch {
                expected: API_VERSION,
                response: resp.to_string(),
            })
        }
    }

    /// One get.health.metrics call. A present `result` that does not decode as host
    /// collections is treated like a missing one.
    pub async fn fetch_metrics(&mut self) -> Result<RawMetrics, RpcError> {
        let id = self.ids.next_id();
        self.fetch_metrics_with_id(id).await
    }

    async fn fetch_metrics_with_id(&mut self, id: u32) -> Result<RawMetrics, RpcError> {
        let mut resp = self.call_with_id(id, METHOD_METRICS, None).await?;
        let result = resp
            .get_mut("result")
            .map(Value::take)
            .ok_or(RpcError::MissingResult { method: METHOD_METRICS })?;
        serde_json::from_value(result).map_err(|e| {
            debug!(error = %e, "metrics result has unexpected shape");
            RpcError::MissingResult { method: METHOD_METRICS }
        })
    }

    async fn attempt(&mut self, metrics_id: u32) -> Result<RawMetrics, RpcError> {
        self.ping().await?;
        self.handshake().await?;
        self.fetch_metrics_with_id(metrics_id).await
    }

    /// Full fetch: each attempt runs ping, handshake and metrics in order. Any failure
    /// closes and reopens the connection and consumes one attempt. `None` means no data
    /// this cycle.
    ///
    /// The metrics request id is taken once, before the first ping, and reused by every
    /// attempt; ping and handshake take a fresh id each time.
    pub async fn fetch_with_retry(&mut self) -> Option<RawMetrics> {
        let metrics_id = self.ids.next_id();
        for attempt in 1..=self.fetch_attempts {
            match self.attempt(metrics_id).await {
                Ok(metrics) => {
                    debug!(attempt, hosts = metrics.len(), "metrics fetched");
                    return Some(metrics);
                }
                Err(e) => {
                    warn!(
                        address = %self.address,
                        attempt,
                        error = %e,
                        "metrics attempt failed; reconnecting"
                    );
                }
            }
            self.close().await;
            self.connect().await;
            self.reconnects += 1;
        }
        warn!(
            address = %self.address,
            attempts = self.fetch_attempts,
            "metrics fetch exhausted retries"
        );
        None
    }
}
