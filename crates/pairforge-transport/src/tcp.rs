//! Newline-delimited TCP transport.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Longest line accepted from a peer, terminator included.
pub const MAX_LINE_BYTES: u64 = 8 * 1024;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP [`Transport`] whose connections speak `\n`-terminated UTF-8 lines.
pub struct TcpLineTransport {
    listener: TcpListener,
}

impl TcpLineTransport {
    /// Binds a new TCP line transport. Use port 0 for an ephemeral port.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::debug!(addr, "TCP line transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpLineTransport {
    type Connection = TcpLineConnection;

    async fn accept(&mut self) -> Result<TcpLineConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted TCP connection");

        let (read, write) = stream.into_split();
        Ok(TcpLineConnection {
            id,
            peer,
            reader: Mutex::new(LineReader::new(read)),
            writer: Mutex::new(write),
        })
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::BindFailed)
    }
}

/// A single TCP connection framed by newlines.
pub struct TcpLineConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<LineReader>,
    writer: Mutex<OwnedWriteHalf>,
}

/// Read side of a connection.
///
/// Bytes of a partly received line live in `pending` rather than in a
/// future's locals, so a cancelled `recv` loses nothing and the next call
/// picks up where it stopped.
struct LineReader {
    inner: BufReader<OwnedReadHalf>,
    pending: Vec<u8>,
    /// Skipping the rest of a line that was already rejected as too long.
    discarding: bool,
}

impl LineReader {
    fn new(read: OwnedReadHalf) -> Self {
        Self {
            inner: BufReader::new(read),
            pending: Vec::new(),
            discarding: false,
        }
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let max = MAX_LINE_BYTES as usize;
        loop {
            // `fill_buf` is cancel safe: nothing is consumed until the
            // bytes have been moved into `pending`.
            let buf = self.inner.fill_buf().await?;
            if buf.is_empty() {
                self.discarding = false;
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let line = std::mem::take(&mut self.pending);
                return decode_line(line).map(Some);
            }

            let (len, complete) = match buf.iter().position(|&b| b == b'\n') {
                Some(idx) => (idx + 1, true),
                None => (buf.len(), false),
            };

            if self.discarding {
                self.inner.consume(len);
                if complete {
                    self.discarding = false;
                }
                continue;
            }

            self.pending.extend_from_slice(&buf[..len]);
            self.inner.consume(len);

            if complete {
                let line = std::mem::take(&mut self.pending);
                if line.len() > max {
                    return Err(line_too_long());
                }
                return decode_line(line).map(Some);
            }
            if self.pending.len() >= max {
                // The terminator can no longer fit; drop the rest of the line.
                self.pending.clear();
                self.discarding = true;
                return Err(line_too_long());
            }
        }
    }
}

fn decode_line(mut line: Vec<u8>) -> io::Result<String> {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn line_too_long() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "line too long")
}

impl TcpLineConnection {
    /// Returns the remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for TcpLineConnection {
    async fn send(&self, line: &str) -> Result<(), TransportError> {
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        self.writer
            .lock()
            .await
            .write_all(framed.as_bytes())
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        self.reader
            .lock()
            .await
            .next_line()
            .await
            .map_err(TransportError::ReceiveFailed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
