//! Low-level connection to a tracker server

use std::collections::VecDeque;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{ClientMessage, FrameCodec, ServerMessage};

/// Default time to wait for a connection or a reply
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Framed connection to a tracker server
///
/// Requests are answered in order, but vendor events can be pushed at any
/// time. [`request`](Self::request) sets such events aside so
/// [`next_event`](Self::next_event) can hand them out later.
pub struct TrackerConnector {
    socket: TcpStream,
    codec: FrameCodec,
    read_buf: BytesMut,
    write_buf: BytesMut,
    pending_events: VecDeque<ServerMessage>,
    request_timeout: Duration,
}

impl TrackerConnector {
    /// Connect to a server
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let socket = tokio::time::timeout(DEFAULT_REQUEST_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout)??;
        socket.set_nodelay(true)?;

        tracing::debug!(peer = ?socket.peer_addr().ok(), "Connected to tracker");

        Ok(Self {
            socket,
            codec: FrameCodec::new(),
            read_buf: BytesMut::with_capacity(8 * 1024),
            write_buf: BytesMut::with_capacity(1024),
            pending_events: VecDeque::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Set how long [`request`](Self::request) waits for a reply
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    /// Send one message
    pub async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        self.write_buf.clear();
        self.codec.encode(message, &mut self.write_buf)?;
        self.socket.write_all(&self.write_buf).await?;
        Ok(())
    }

    /// Receive the next frame of any kind
    pub async fn recv(&mut self) -> Result<ServerMessage> {
        loop {
            if let Some(message) = self.codec.decode::<ServerMessage>(&mut self.read_buf)? {
                return Ok(message);
            }

            let n = self.socket.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Send a request and wait for its reply, buffering events seen meanwhile
    pub async fn request(&mut self, message: &ClientMessage) -> Result<ServerMessage> {
        self.send(message).await?;

        tokio::time::timeout(self.request_timeout, self.recv_reply())
            .await
            .map_err(|_| Error::Timeout)?
    }

    async fn recv_reply(&mut self) -> Result<ServerMessage> {
        loop {
            let message = self.recv().await?;
            if !message.is_event() {
                return Ok(message);
            }
            self.pending_events.push_back(message);
        }
    }

    /// Send a request that is answered with an `ack`
    ///
    /// Returns the number of viewers the resulting event reached. An `error`
    /// reply becomes [`Error::Rejected`].
    pub async fn expect_ack(&mut self, message: &ClientMessage) -> Result<usize> {
        match self.request(message).await? {
            ServerMessage::Ack { delivered, .. } => Ok(delivered),
            other => Err(unexpected_reply(other)),
        }
    }

    /// Next pushed vendor event, buffered or fresh
    pub async fn next_event(&mut self) -> Result<ServerMessage> {
        if let Some(event) = self.pending_events.pop_front() {
            return Ok(event);
        }

        loop {
            let message = self.recv().await?;
            if message.is_event() {
                return Ok(message);
            }
            tracing::debug!(message = ?message, "Ignoring unsolicited reply");
        }
    }

    /// Number of events received but not yet handed out
    pub fn pending_events(&self) -> usize {
        self.pending_events.len()
    }

    /// Close the connection
    pub async fn shutdown(mut self) -> Result<()> {
        self.socket.shutdown().await?;
        Ok(())
    }
}

/// Convert a reply that was not the expected one into an error
pub(crate) fn unexpected_reply(reply: ServerMessage) -> Error {
    match reply {
        ServerMessage::Error { kind, message } => Error::Rejected { kind, message },
        other => ProtocolError::UnexpectedMessage(format!("{:?}", other)).into(),
    }
}
