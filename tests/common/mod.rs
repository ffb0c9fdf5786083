// Shared test helpers: metric builders, a scripted transport and a fake health node.
#![allow(dead_code)]

use magnum_poller::error::TransportError;
use magnum_poller::models::{HostCollection, RawMetric, RawMetrics};
use magnum_poller::transport::Transport;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

pub fn metric(label: &str, value: &str, status: &str) -> RawMetric {
    RawMetric::new(label, value, status)
}

pub fn ok(label: &str, value: &str) -> RawMetric {
    metric(label, value, "Ok")
}

/// The five metrics the node reports for a healthy service.
pub fn service_metrics(name: &str, state: &str) -> Vec<RawMetric> {
    vec![
        ok(&format!("Services: {} State", name), state),
        ok(&format!("Services: {} CPU Usage (%)", name), "12.5%"),
        ok(&format!("Services: {} Memory Usage (%)", name), "2.25%"),
        ok(&format!("Services: {} Total Resident Memory", name), "1.5M"),
        ok(&format!("Services: {} Main PID", name), "4242"),
    ]
}

/// Cluster metrics for `host` with the given online flag and failover token values.
pub fn cluster_metrics(host: &str, online: &str, tokens: &[&str]) -> Vec<RawMetric> {
    let names = ["cl-token", "cl-ip1", "db-ip1", "db-token"];
    let mut out = vec![
        ok("Cluster: Maintenance mode", "No"),
        ok(&format!("Cluster: Online ({})", host), online),
    ];
    for (name, value) in names.iter().zip(tokens) {
        out.push(ok(&format!("Cluster: Resource {}", name), value));
    }
    out
}

pub fn host(hostname: &str, metrics: Vec<RawMetric>) -> HostCollection {
    HostCollection {
        hostname: hostname.to_string(),
        overall_health: "Ok".to_string(),
        health_metrics: metrics,
    }
}

pub fn raw_metrics(hosts: Vec<HostCollection>) -> RawMetrics {
    hosts
        .into_iter()
        .enumerate()
        .map(|(i, h)| (format!("node{}", i), h))
        .collect()
}

/// A two-host redundant pair: host-a active, host-b standby.
pub fn redundant_pair() -> RawMetrics {
    let mut a = service_metrics("nginx", "Running");
    a.extend(service_metrics("eventd", "Running"));
    a.extend(cluster_metrics("host-a", "Yes", &["Started", "Started"]));

    let mut b = service_metrics("nginx", "Running");
    b.extend(service_metrics("eventd", "Not Running"));
    b.extend(cluster_metrics("host-b", "Yes", &["Stopped", "Stopped"]));

    raw_metrics(vec![host("host-a", a), host("host-b", b)])
}

pub fn pong(request: &Value) -> Result<Value, TransportError> {
    Ok(json!({ "id": request["id"], "jsonrpc": "2.0", "result": "pong" }))
}

pub fn version(request: &Value, selected: u64) -> Result<Value, TransportError> {
    Ok(json!({
        "id": request["id"],
        "jsonrpc": "2.0",
        "result": { "server_selected_version": selected }
    }))
}

pub fn metrics_result(request: &Value, metrics: &RawMetrics) -> Result<Value, TransportError> {
    Ok(json!({ "id": request["id"], "jsonrpc": "2.0", "result": metrics }))
}

pub fn timeout_error() -> TransportError {
    TransportError::Timeout { operation: "read" }
}

type Responder = Box<dyn FnMut(&Value) -> Result<Value, TransportError>>;

/// In-memory transport driven by a responder closure; counts connects and closes.
pub struct ScriptedTransport {
    pub connected: bool,
    pub connects: usize,
    pub closes: usize,
    pub fail_connect: bool,
    pub requests: Vec<Value>,
    responder: Responder,
}

impl ScriptedTransport {
    pub fn new(responder: impl FnMut(&Value) -> Result<Value, TransportError> + 'static) -> Self {
        Self {
            connected: false,
            connects: 0,
            closes: 0,
            fail_connect: false,
            requests: Vec::new(),
            responder: Box::new(responder),
        }
    }

    /// A node that answers every method correctly.
    pub fn healthy(metrics: RawMetrics) -> Self {
        Self::new(move |req| match req["method"].as_str() {
            Some("ping") => pong(req),
            Some("health.api.handshake") => version(req, 2),
            Some("get.health.metrics") => metrics_result(req, &metrics),
            _ => Err(timeout_error()),
        })
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests
            .iter()
            .map(|r| r["method"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    async fn connect(&mut self, _address: &str, _port: u16) -> Result<(), TransportError> {
        self.connects += 1;
        if self.fail_connect {
            return Err(TransportError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )));
        }
        self.connected = true;
        Ok(())
    }

    async fn send_receive(&mut self, request: &str) -> Result<Value, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        assert!(request.ends_with("\r\n"), "request not framed: {:?}", request);
        let parsed: Value = serde_json::from_str(request.trim_end()).expect("request is JSON");
        self.requests.push(parsed.clone());
        (self.responder)(&parsed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.connected = false;
        self.closes += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// What the fake node does with one request.
pub enum Reply {
    /// Write the JSON text followed by CR LF.
    Frame(String),
    /// Write raw byte chunks, sleeping before each one.
    Chunks(Vec<(Duration, Vec<u8>)>),
    /// Write the bytes as-is, then drop the connection.
    Last(Vec<u8>),
    /// Say nothing; the client should time out.
    Silent,
    /// Drop the connection.
    Close,
}

pub type Handler = Arc<dyn Fn(&Value) -> Reply + Send + Sync>;

/// A node answering the three health methods correctly with `metrics`.
pub fn healthy_handler(metrics: RawMetrics) -> Handler {
    Arc::new(move |req| {
        let id = req["id"].clone();
        let body = match req["method"].as_str() {
            Some("ping") => json!({ "id": id, "jsonrpc": "2.0", "result": "pong" }),
            Some("health.api.handshake") => json!({
                "id": id, "jsonrpc": "2.0", "result": { "server_selected_version": 2 }
            }),
            Some("get.health.metrics") => json!({ "id": id, "jsonrpc": "2.0", "result": metrics }),
            _ => json!({ "id": id, "jsonrpc": "2.0", "error": { "code": -32601 } }),
        };
        Reply::Frame(body.to_string())
    })
}

/// Listen on an ephemeral localhost port and serve every connection with `handler`.
/// Returns the port.
pub async fn spawn_fake_node(handler: Handler) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local_addr").port();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let handler = handler.clone();
            tokio::spawn(async move {
                let (read_half, mut write_half) = socket.into_split();
                let mut reader = BufReader::new(read_half);
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {}
                    }
                    let Ok(request) = serde_json::from_str::<Value>(line.trim_end()) else {
                        return;
                    };
                    match handler(&request) {
                        Reply::Frame(text) => {
                            let framed = format!("{}\r\n", text);
                            if write_half.write_all(framed.as_bytes()).await.is_err() {
                                return;
                            }
                        }
                        Reply::Chunks(chunks) => {
                            for (delay, bytes) in chunks {
                                tokio::time::sleep(delay).await;
                                if write_half.write_all(&bytes).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Reply::Last(bytes) => {
                            let _ = write_half.write_all(&bytes).await;
                            return;
                        }
                        Reply::Silent => {}
                        Reply::Close => return,
                    }
                }
            });
        }
    });
    port
}
