//! TCP connection to the playout server.
//!
//! A writer task drains a single unbounded queue into the socket, so payloads
//! leave in the order [`Transport::send`] accepted them. A reader task decodes
//! inbound bytes as UTF-8 (holding back split multi-byte sequences) and
//! forwards the text to a channel that [`pump`] feeds into the executor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use caspar_config::ServerEndpoint;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Transport;
use crate::error::{ExecutorError, TransportError};
use crate::executor::CommandExecutor;

const TRANSPORT_TARGET: &str = "caspar_protocol::transport";
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Outbound half of a TCP connection.
#[derive(Debug)]
pub struct TcpTransport {
    outbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Connects to `endpoint` and starts the reader and writer tasks.
    ///
    /// Returns the transport together with the receiver of inbound text.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] when the connection cannot be opened.
    pub async fn connect(
        endpoint: &ServerEndpoint,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>), TransportError> {
        let stream = TcpStream::connect(endpoint.address()).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        let connected = Arc::new(AtomicBool::new(true));
        let (outbound, queue) = mpsc::unbounded_channel();
        let (inbound, received) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(writer, queue, Arc::clone(&connected)));
        tokio::spawn(read_loop(reader, inbound, Arc::clone(&connected)));

        info!(target: TRANSPORT_TARGET, %peer, "connected to server");
        Ok((
            Self {
                outbound,
                connected,
                peer,
            },
            received,
        ))
    }

    /// Address of the server.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn send(&self, payload: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.outbound
            .send(payload.to_owned())
            .map_err(|_| TransportError::Disconnected)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
) {
    while let Some(payload) = queue.recv().await {
        if let Err(error) = writer.write_all(payload.as_bytes()).await {
            warn!(target: TRANSPORT_TARGET, %error, "failed to write to server");
            connected.store(false, Ordering::SeqCst);
            return;
        }
    }
    if let Err(error) = writer.shutdown().await {
        debug!(target: TRANSPORT_TARGET, %error, "failed to shut down writer");
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    inbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
) {
    let mut buffer = vec![0_u8; READ_BUFFER_SIZE];
    let mut decoder = Utf8Chunker::default();
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                info!(target: TRANSPORT_TARGET, "server closed the connection");
                break;
            }
            Ok(read) => {
                let chunk = decoder.decode(buffer.get(..read).unwrap_or_default());
                if !chunk.is_empty() && inbound.send(chunk).is_err() {
                    debug!(target: TRANSPORT_TARGET, "inbound receiver dropped");
                    break;
                }
            }
            Err(error) => {
                warn!(target: TRANSPORT_TARGET, %error, "failed to read from server");
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

/// Feeds inbound text into `executor` until the connection closes, then
/// fails every request still waiting with [`TransportError::Disconnected`].
///
/// A [`TcpTransport`] never reconnects, so nothing could answer them.
pub async fn pump(executor: &CommandExecutor, mut inbound: mpsc::UnboundedReceiver<String>) {
    while let Some(chunk) = inbound.recv().await {
        executor.receive(&chunk);
    }
    let failed = executor.fail_pending(&ExecutorError::Transport(TransportError::Disconnected));
    debug!(target: TRANSPORT_TARGET, failed, "inbound stream ended");
}

/// Decodes a byte stream as UTF-8 across read boundaries.
#[derive(Debug, Default)]
struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    /// Returns the text that is complete so far.
    ///
    /// An incomplete trailing sequence is kept for the next call; invalid
    /// bytes are replaced.
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let complete = match std::str::from_utf8(&self.pending) {
            Err(error) if error.error_len().is_none() => error.valid_up_to(),
            _ => self.pending.len(),
        };
        let tail = self.pending.split_off(complete);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = tail;
        text
    }
}
