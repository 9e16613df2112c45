//! Per-connection handler
//!
//! Reads client frames, applies them to the tracker and writes replies. The
//! same task drains the connection's viewer queue, so pushed events and
//! replies share one ordered outbound stream.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, ProtocolError, Result};
use crate::geo::Position;
use crate::protocol::{ClientMessage, ErrorKind, FrameCodec, RegionRequest, ServerMessage};
use crate::registry::{
    BroadcastEvent, EventReceiver, EventSender, Region, SubscriptionFilter, TrackerError, VendorId,
    VendorTracker, VendorUpdate, ViewerId,
};
use crate::server::config::ServerConfig;
use crate::server::handler::{AuthResult, TrackerHandler};
use crate::session::{SessionContext, SessionState};

/// What woke the connection loop
enum Activity {
    Read(std::io::Result<usize>),
    Event(Arc<BroadcastEvent>),
    Idle,
}

/// Per-connection handler
pub struct Connection<H: TrackerHandler> {
    /// Session state
    state: SessionState,

    /// TCP socket
    socket: TcpStream,

    /// Read buffer
    read_buf: BytesMut,

    /// Write buffer
    write_buf: BytesMut,

    codec: FrameCodec,

    /// Server configuration
    config: ServerConfig,

    /// Handler
    handler: Arc<H>,

    /// Shared tracker
    tracker: Arc<VendorTracker>,

    /// Viewer queue; the sender is handed to the tracker on subscribe
    events_tx: EventSender,
    events_rx: EventReceiver,

    /// Time of the last complete frame
    last_frame: Instant,
}

impl<H: TrackerHandler> Connection<H> {
    /// Create a new connection handler
    pub fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        handler: Arc<H>,
        tracker: Arc<VendorTracker>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.viewer_queue_capacity);

        Self {
            state: SessionState::new(session_id, peer_addr),
            socket,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            write_buf: BytesMut::with_capacity(4096),
            codec: FrameCodec::with_max_frame_size(config.max_frame_size),
            config,
            handler,
            tracker,
            events_tx,
            events_rx,
            last_frame: Instant::now(),
        }
    }

    /// Run the connection until the peer leaves, idles out or breaks protocol
    pub async fn run(&mut self) -> Result<()> {
        let ctx = SessionContext::from_state(&self.state);
        if !self.handler.on_connection(&ctx).await {
            tracing::debug!(session_id = self.state.id, "Connection rejected by handler");
            self.state.finish();
            return Ok(());
        }

        let result = self.serve().await;
        self.teardown().await;
        result
    }

    async fn serve(&mut self) -> Result<()> {
        loop {
            let deadline = self.last_frame + self.config.idle_timeout;
            // A subscribed viewer may sit silent for as long as it likes
            let watch_idle = !self.state.is_viewer();

            let activity = tokio::select! {
                read = self.socket.read_buf(&mut self.read_buf) => Activity::Read(read),
                event = self.events_rx.recv() => match event {
                    Some(event) => Activity::Event(event),
                    None => continue,
                },
                _ = tokio::time::sleep_until(deadline), if watch_idle => Activity::Idle,
            };

            match activity {
                Activity::Read(Ok(0)) => {
                    tracing::debug!(session_id = self.state.id, "Peer closed connection");
                    return Ok(());
                }
                Activity::Read(Ok(n)) => {
                    self.state.stats.bytes_received += n as u64;
                    self.process_frames().await?;
                }
                Activity::Read(Err(e)) => return Err(Error::Io(e)),
                Activity::Event(event) => self.forward_events(event).await?,
                Activity::Idle => {
                    tracing::debug!(
                        session_id = self.state.id,
                        timeout = ?self.config.idle_timeout,
                        "Idle timeout"
                    );
                    return Err(Error::Timeout);
                }
            }
        }
    }

    /// Decode and handle every complete frame in the read buffer
    async fn process_frames(&mut self) -> Result<()> {
        loop {
            match self.codec.decode::<ClientMessage>(&mut self.read_buf) {
                Ok(Some(message)) => {
                    self.last_frame = Instant::now();
                    self.state.stats.frames_received += 1;
                    self.state.activate();

                    let reply = self.handle_message(message).await;
                    self.queue(&reply)?;
                }
                Ok(None) => break,
                Err(ProtocolError::FrameTooLarge { size, max }) => {
                    tracing::warn!(
                        session_id = self.state.id,
                        size = size,
                        max = max,
                        "Frame too large, closing"
                    );
                    let reply = ServerMessage::error(
                        ErrorKind::Protocol,
                        format!("frame exceeds {} bytes", max),
                    );
                    self.queue(&reply)?;
                    self.flush().await?;
                    return Err(ProtocolError::FrameTooLarge { size, max }.into());
                }
                Err(e) => {
                    self.last_frame = Instant::now();
                    tracing::debug!(session_id = self.state.id, error = %e, "Bad frame");
                    self.queue(&ServerMessage::error(ErrorKind::Protocol, e.to_string()))?;
                }
            }
        }

        self.flush().await
    }

    async fn handle_message(&mut self, message: ClientMessage) -> ServerMessage {
        let op = message.op();
        tracing::trace!(session_id = self.state.id, op = op, "Request");

        let result = match message {
            ClientMessage::AnnounceOnline { vendor_id, lat, lng } => {
                self.announce_online(vendor_id, lat, lng).await
            }
            ClientMessage::ReportPosition { vendor_id, lat, lng } => {
                self.vendor_update(VendorUpdate::moved(vendor_id, lat, lng)).await
            }
            ClientMessage::AnnounceOffline { vendor_id } => {
                self.vendor_update(VendorUpdate::offline(vendor_id)).await
            }
            ClientMessage::Subscribe { region } => self.subscribe(region).await,
            ClientMessage::Unsubscribe => {
                self.tracker.unsubscribe(self.viewer_id()).await;
                self.state.subscription = None;
                Ok(0)
            }
            ClientMessage::FindNearby { lat, lng, radius_km } => {
                return match self.find_nearby(lat, lng, radius_km).await {
                    Ok(reply) => reply,
                    Err(e) => ServerMessage::from(&e),
                };
            }
            ClientMessage::Ping => return ServerMessage::Pong,
        };

        match result {
            Ok(delivered) => ServerMessage::ack(op, delivered),
            Err(reply) => reply,
        }
    }

    async fn announce_online(
        &mut self,
        vendor_id: String,
        lat: f64,
        lng: f64,
    ) -> std::result::Result<usize, ServerMessage> {
        let id = self.bound_vendor_id(&vendor_id)?;
        let position = Position::new(lat, lng).map_err(|e| ServerMessage::from(&e))?;

        let ctx = SessionContext::from_state(&self.state);
        if let AuthResult::Reject(reason) =
            self.handler.on_vendor_online(&ctx, &id, position).await
        {
            tracing::info!(
                session_id = self.state.id,
                vendor = %id,
                reason = %reason,
                "Vendor rejected"
            );
            return Err(ServerMessage::error(ErrorKind::Unauthorized, reason));
        }

        let meta = self.handler.vendor_profile(&id).await.unwrap_or_default();
        let update = VendorUpdate::Online {
            vendor_id,
            lat,
            lng,
            meta,
        };

        let delivered = self.vendor_update(update).await?;
        self.state.bind_vendor(id);
        Ok(delivered)
    }

    async fn vendor_update(
        &mut self,
        update: VendorUpdate,
    ) -> std::result::Result<usize, ServerMessage> {
        let id = self.bound_vendor_id(update.raw_vendor_id())?;
        let going_offline = matches!(update, VendorUpdate::Offline { .. });

        let report = self
            .tracker
            .publish(self.state.id, update)
            .await
            .map_err(|e| ServerMessage::from(&e))?;

        if going_offline && self.state.vendor.as_ref() == Some(&id) {
            self.state.release_vendor();
        }

        Ok(report.delivered)
    }

    /// Parse a vendor id and check it against the connection's binding
    fn bound_vendor_id(&self, raw: &str) -> std::result::Result<VendorId, ServerMessage> {
        let id = VendorId::parse(raw).map_err(|e| ServerMessage::from(&e))?;
        self.state.check_vendor(&id).map_err(|conflict| {
            ServerMessage::from(&TrackerError::InvalidInput(format!(
                "connection is bound to vendor {}",
                conflict.bound
            )))
        })?;
        Ok(id)
    }

    async fn subscribe(
        &mut self,
        region: Option<RegionRequest>,
    ) -> std::result::Result<usize, ServerMessage> {
        let filter = match region {
            Some(r) => {
                let center = Position::new(r.lat, r.lng).map_err(|e| ServerMessage::from(&e))?;
                SubscriptionFilter::Region(Region::new(center, r.radius_km))
            }
            None => SubscriptionFilter::Unfiltered,
        };

        let ctx = SessionContext::from_state(&self.state);
        if let AuthResult::Reject(reason) = self.handler.on_subscribe(&ctx, &filter).await {
            return Err(ServerMessage::error(ErrorKind::Unauthorized, reason));
        }

        let installed = self
            .tracker
            .subscribe(self.viewer_id(), filter, self.events_tx.clone())
            .await
            .map_err(|e| ServerMessage::from(&e))?;

        self.state.subscription = Some(installed);
        Ok(0)
    }

    async fn find_nearby(
        &self,
        lat: f64,
        lng: f64,
        radius_km: Option<f64>,
    ) -> std::result::Result<ServerMessage, TrackerError> {
        let center = Position::new(lat, lng)?;
        let results = self.tracker.find_nearby(center, radius_km).await?;
        Ok(ServerMessage::Nearby { results })
    }

    /// Write a queued event plus whatever else is already waiting
    async fn forward_events(&mut self, first: Arc<BroadcastEvent>) -> Result<()> {
        self.last_frame = Instant::now();
        self.queue(&ServerMessage::from(first.as_ref()))?;
        self.state.stats.events_forwarded += 1;

        while let Ok(event) = self.events_rx.try_recv() {
            self.queue(&ServerMessage::from(event.as_ref()))?;
            self.state.stats.events_forwarded += 1;
        }

        self.flush().await
    }

    fn queue(&mut self, message: &ServerMessage) -> Result<()> {
        self.codec.encode(message, &mut self.write_buf)?;
        self.state.stats.frames_sent += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        self.socket.write_all(&self.write_buf).await?;
        self.state.stats.bytes_sent += self.write_buf.len() as u64;
        self.write_buf.clear();
        Ok(())
    }

    fn viewer_id(&self) -> ViewerId {
        ViewerId(self.state.id)
    }

    /// Release everything the session holds in the tracker
    async fn teardown(&mut self) {
        self.state.close();

        if self.state.subscription.take().is_some() {
            self.tracker.unsubscribe(self.viewer_id()).await;
        }

        if let Some(vendor_id) = self.state.vendor.clone() {
            let report = self
                .tracker
                .disconnect_vendor(&vendor_id, self.state.id)
                .await;
            if report.event.is_some() {
                tracing::info!(
                    session_id = self.state.id,
                    vendor = %vendor_id,
                    delivered = report.delivered,
                    "Vendor offline on disconnect"
                );
            }
        }

        self.state.finish();
        let ctx = SessionContext::from_state(&self.state);
        self.handler.on_disconnect(&ctx).await;

        tracing::debug!(
            session_id = self.state.id,
            frames_received = self.state.stats.frames_received,
            frames_sent = self.state.stats.frames_sent,
            events_forwarded = self.state.stats.events_forwarded,
            duration = ?self.state.stats.duration,
            "Session finished"
        );
    }
}
