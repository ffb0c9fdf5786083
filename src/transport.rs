// Line-framed JSON-RPC transport over a single TCP connection.
// Every network operation is bounded by the io timeout; nothing here panics or retries.

use crate::error::TransportError;
use bytes::BytesMut;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

/// CR LF terminates every frame in both directions.
pub const END_OF_FRAME: &str = "\r\n";

/// Default per-operation socket timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 1024;

/// One owned connection to the node. Implemented by [`TcpTransport`] and by test fakes.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn connect(&mut self, address: &str, port: u16) -> Result<(), TransportError>;

    /// Send one already-framed request and read back one JSON document.
    async fn send_receive(&mut self, request: &str) -> Result<Value, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

pub struct TcpTransport {
    stream: Option<TcpStream>,
    io_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_IO_TIMEOUT)
    }
}

impl TcpTransport {
    pub fn new(io_timeout: Duration) -> Self {
        Self {
            stream: None,
            io_timeout,
        }
    }

    /// Discard whatever a previous exchange left unread so the next response starts on a
    /// frame boundary. Never blocks.
    fn drain(stream: &TcpStream) -> Result<usize, TransportError> {
        let mut scratch = [0u8; READ_CHUNK];
        let mut drained = 0;
        loop {
            match stream.try_read(&mut scratch) {
                Ok(0) => return Ok(drained),
                Ok(n) => drained += n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(drained),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Accumulate chunks until the end-of-frame marker shows up, the peer closes, or a read
    /// times out.
    async fn read_frame(
        stream: &mut TcpStream,
        io_timeout: Duration,
    ) -> Result<BytesMut, TransportError> {
        let mut acc = BytesMut::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = match timeout(io_timeout, stream.read(&mut chunk)).await {
                Err(_) => break,
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(e.into()),
            };
            // Marker may straddle two chunks.
            let search_from = acc.len().saturating_sub(END_OF_FRAME.len() - 1);
            acc.extend_from_slice(&chunk[..n]);
            if contains_marker(&acc[search_from..]) {
                break;
            }
        }
        Ok(acc)
    }
}

fn contains_marker(haystack: &[u8]) -> bool {
    haystack
        .windows(END_OF_FRAME.len())
        .any(|w| w == END_OF_FRAME.as_bytes())
}

/// Parse one accumulated frame. Trailing CR LF is plain JSON whitespace.
pub fn parse_frame(frame: &[u8]) -> Result<Value, TransportError> {
    if frame.is_empty() {
        return Err(TransportError::Closed);
    }
    let text = String::from_utf8(frame.to_vec())?;
    Ok(serde_json::from_str(&text)?)
}

impl Transport for TcpTransport {
    #[instrument(skip(self), fields(transport = "tcp", operation = "connect"))]
    async fn connect(&mut self, address: &str, port: u16) -> Result<(), TransportError> {
        let addr = format!("{}:{}", address, port);
        let stream = match timeout(self.io_timeout, TcpStream::connect(&addr)).await {
            Err(_) => return Err(TransportError::Timeout { operation: "connect" }),
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Ok(Ok(s)) => s,
        };
        stream.set_nodelay(true)?;
        debug!(%addr, "connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send_receive(&mut self, request: &str) -> Result<Value, TransportError> {
        let io_timeout = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        let stale = Self::drain(stream)?;
        if stale > 0 {
            debug!(bytes = stale, "drained stale bytes before request");
        }

        match timeout(io_timeout, stream.write_all(request.as_bytes())).await {
            Err(_) => return Err(TransportError::Timeout { operation: "write" }),
            Ok(r) => r?,
        }

        let frame = Self::read_frame(stream, io_timeout).await?;
        parse_frame(&frame)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let stream = self.stream.take().ok_or(TransportError::NotConnected)?;
        let std_stream = stream.into_std()?;
        std_stream.shutdown(std::net::Shutdown::Both)?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
