// Transport and protocol error taxonomy.
// Both kinds are recoverable: they consume one fetch attempt and never escape a poll cycle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("not connected")]
    NotConnected,
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
    #[error("socket i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer closed the connection before sending a frame")]
    Closed,
    #[error("response is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("ping answered {0} instead of \"pong\"")]
    UnexpectedPong(String),
    #[error("handshake did not select api version {expected}: {response}")]
    VersionMismatch { expected: u64, response: String },
    #[error("{method} response has no result")]
    MissingResult { method: &'static str },
}
